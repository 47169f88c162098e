use ndarray::{Axis, Ix2, Ix4};
use tracing::{debug, info};

use crate::error::{KymoError, Result};
use crate::pipeline::PipelineConfig;
use crate::signal::{median_filter_columns, percentile, percentile_along, triangle_threshold};
use crate::store::{view_as, ChunkInput, ChunkedStore, Dataset, Element, OutputSpec};

pub const Y_PERCENTILE_KEY: &str = "rows/percentile";
pub const Y_SMOOTHED_KEY: &str = "rows/smoothed";

/// Row boundaries of one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowEdges {
    /// Per timepoint, ascending y positions of the kept row boundaries; two
    /// per row.
    pub edges: Vec<Vec<usize>>,
    pub row_count: usize,
}

impl RowEdges {
    pub fn timepoints(&self) -> usize {
        self.edges.len()
    }
}

/// Collapse x of the segmentation channel to a percentile: (c, y, x, t) -> (y, t).
pub fn y_percentiles<T: Element>(
    store: &ChunkedStore,
    imported: &Dataset<T>,
    config: &PipelineConfig,
) -> Result<Dataset<f64>> {
    let shape = imported.shape();
    let (y_dim, t_dim) = (shape[1], shape[3]);
    let q = config.rows.y_percentile;

    store.apply(
        &[ChunkInput::new(imported, 3)],
        config.t_chunk,
        &OutputSpec::new(Y_PERCENTILE_KEY, vec![y_dim, t_dim], 1),
        |_, arrays| {
            let chunk = view_as::<Ix4, _>(&arrays[0])?;
            let seg = chunk.index_axis(Axis(0), 0);
            Ok(percentile_along(&seg, 1, q).into_dyn())
        },
    )
}

/// Median-smooth the y profile of every timepoint: (y, t) -> (y, t).
pub fn smooth_y(
    store: &ChunkedStore,
    profile: &Dataset<f64>,
    config: &PipelineConfig,
) -> Result<Dataset<f64>> {
    let kernel = config.rows.smoothing_kernel_y;
    store.apply(
        &[ChunkInput::new(profile, 1)],
        config.t_chunk,
        &OutputSpec::new(Y_SMOOTHED_KEY, profile.shape().to_vec(), 1),
        |_, arrays| {
            let chunk = view_as::<Ix2, _>(&arrays[0])?;
            Ok(median_filter_columns(chunk, kernel).into_dyn())
        },
    )
}

/// Threshold the smoothed profile and pair its transitions into rows.
///
/// One triangle threshold is taken over the whole series so every timepoint
/// is segmented alike.
pub fn detect_row_edges(smoothed: &Dataset<f64>, config: &PipelineConfig) -> Result<RowEdges> {
    let rows = &config.rows;

    let mut values = Vec::with_capacity(smoothed.header().element_count());
    for window in smoothed.windows(1, config.t_chunk) {
        let (_, chunk) = window?;
        values.extend(chunk.iter().copied());
    }
    let threshold = triangle_threshold(&values, rows.triangle_nbins) * rows.triangle_scaling;
    drop(values);
    debug!(threshold, "Row threshold");

    let mut edges = Vec::with_capacity(smoothed.shape()[1]);
    for window in smoothed.windows(1, config.t_chunk) {
        let (range, chunk) = window?;
        let chunk = view_as::<Ix2, _>(&chunk)?;
        for (column, t) in chunk.axis_iter(Axis(1)).zip(range) {
            let mask: Vec<bool> = column.iter().map(|&v| v > threshold).collect();
            edges.push(paired_row_edges(&mask, rows.y_min_edge_dist, t)?);
        }
    }

    let row_count = row_count(&edges);
    if row_count == 0 {
        return Err(KymoError::Detection("no rows found".into()));
    }
    if let Some((t, e)) = edges
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != 2 * row_count)
    {
        return Err(KymoError::Layout(format!(
            "timepoint {t} has {} rows, expected {row_count}",
            e.len() / 2
        )));
    }

    info!(rows = row_count, timepoints = edges.len(), "Rows detected");
    Ok(RowEdges { edges, row_count })
}

/// Positions `i` where `mask[i] != mask[i + 1]`.
pub fn transition_edges(mask: &[bool]) -> Vec<usize> {
    mask.windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] != w[1])
        .map(|(i, _)| i)
        .collect()
}

/// Transitions of `mask` paired into rows, dropping rows not longer than
/// `min_len`. An odd number of transitions cannot be paired and is an error.
pub fn paired_row_edges(mask: &[bool], min_len: usize, t: usize) -> Result<Vec<usize>> {
    let edges = transition_edges(mask);
    if edges.len() % 2 != 0 {
        return Err(KymoError::Layout(format!(
            "timepoint {t} has {} row edges, which cannot be paired",
            edges.len()
        )));
    }
    Ok(edges
        .chunks_exact(2)
        .filter(|pair| pair[1] - pair[0] > min_len)
        .flatten()
        .copied()
        .collect())
}

/// floor(median edge count) / 2.
pub fn row_count(edges: &[Vec<usize>]) -> usize {
    let mut counts: Vec<f64> = edges.iter().map(|e| e.len() as f64).collect();
    let median = percentile(&mut counts, 50.0);
    if median.is_finite() {
        median.floor() as usize / 2
    } else {
        0
    }
}
