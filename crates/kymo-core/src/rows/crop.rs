use std::ops::Range;

use ndarray::{s, Array5, Ix4};
use tracing::info;

use crate::error::{KymoError, Result};
use crate::pipeline::{PipelineConfig, RowConfig, TrenchOrientation};
use crate::store::{view_as, ChunkInput, ChunkedStore, Dataset, Element, OutputSpec};

use super::detect::RowEdges;

pub const CROPPED_KEY: &str = "rows/cropped";

/// Crop window along y of one row at one timepoint, clipped to `[0, y_dim)`.
///
/// `edges` holds the two boundaries of the row, ascending.
pub fn row_window(
    edges: [usize; 2],
    orientation: TrenchOrientation,
    rows: &RowConfig,
    y_dim: usize,
) -> Range<usize> {
    let (start, end) = match orientation {
        TrenchOrientation::OpenDown => {
            let edge = edges[0];
            (edge.saturating_sub(rows.padding_y), edge + rows.trench_len_y)
        }
        TrenchOrientation::OpenUp => {
            let edge = edges[1];
            (edge.saturating_sub(rows.trench_len_y), edge + rows.padding_y)
        }
    };
    start.min(y_dim)..end.min(y_dim)
}

/// Crop windows of every row at every timepoint: `[t][row]`.
///
/// All windows must share one height so the cropped array is rectangular.
pub fn row_windows(
    row_edges: &RowEdges,
    rows: &RowConfig,
    y_dim: usize,
) -> Result<Vec<Vec<Range<usize>>>> {
    let mut height = None;
    let mut windows = Vec::with_capacity(row_edges.timepoints());

    for (t, edges) in row_edges.edges.iter().enumerate() {
        let mut at_t = Vec::with_capacity(row_edges.row_count);
        for row in 0..row_edges.row_count {
            let pair = edges.get(2 * row..2 * row + 2).ok_or_else(|| {
                KymoError::Layout(format!("timepoint {t} has no edges for row {row}"))
            })?;
            let orientation = rows.top_orientation.for_row(row);
            let window = row_window([pair[0], pair[1]], orientation, rows, y_dim);

            match height {
                None => height = Some(window.len()),
                Some(h) if h != window.len() => {
                    return Err(KymoError::Layout(format!(
                        "row {row} at timepoint {t} crops to height {}, expected {h}",
                        window.len()
                    )));
                }
                Some(_) => {}
            }
            at_t.push(window);
        }
        windows.push(at_t);
    }

    if height == Some(0) {
        return Err(KymoError::Layout("row crop windows are empty".into()));
    }
    Ok(windows)
}

/// Crop every row out of the imported array: (c, y, x, t) -> (row, c, x, height, t).
///
/// Returns the cropped dataset and the crop height.
pub fn crop_rows<T: Element>(
    store: &ChunkedStore,
    imported: &Dataset<T>,
    row_edges: &RowEdges,
    config: &PipelineConfig,
) -> Result<(Dataset<T>, usize)> {
    let shape = imported.shape();
    let (channels, y_dim, x_dim, t_dim) = (shape[0], shape[1], shape[2], shape[3]);
    if row_edges.timepoints() != t_dim {
        return Err(KymoError::Layout(format!(
            "{} edge series for {t_dim} timepoints",
            row_edges.timepoints()
        )));
    }

    let windows = row_windows(row_edges, &config.rows, y_dim)?;
    let height = windows
        .first()
        .and_then(|w| w.first())
        .map_or(0, |w| w.len());
    let n_rows = row_edges.row_count;

    let cropped = store.apply(
        &[ChunkInput::new(imported, 3)],
        config.t_chunk,
        &OutputSpec::new(CROPPED_KEY, vec![n_rows, channels, x_dim, height, t_dim], 4),
        |range, arrays| {
            let chunk = view_as::<Ix4, _>(&arrays[0])?;
            let mut out = Array5::<T>::default((n_rows, channels, x_dim, height, range.len()));
            for (tt, t) in range.enumerate() {
                for (row, window) in windows[t].iter().enumerate() {
                    let src = chunk.slice(s![.., window.start..window.end, .., tt]);
                    out.slice_mut(s![row, .., .., .., tt])
                        .assign(&src.permuted_axes([0, 2, 1]));
                }
            }
            Ok(out.into_dyn())
        },
    )?;

    info!(rows = n_rows, height, "Rows cropped");
    Ok((cropped, height))
}
