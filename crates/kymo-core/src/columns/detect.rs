use ndarray::{s, Array3, ArrayView1, Axis, Ix3, Ix5};
use tracing::{debug, warn};

use crate::consts::MIDPOINT_DROPOUT_RATIO;
use crate::error::{KymoError, Result};
use crate::pipeline::{ColumnConfig, PipelineConfig};
use crate::signal::{median_filter_columns, otsu_threshold, percentile_along};
use crate::store::{view_as, ChunkInput, ChunkedStore, Dataset, Element, OutputSpec};

pub const X_PROFILE_KEY: &str = "columns/profile";

/// Background-subtracted, smoothed x profile of every row:
/// (row, c, x, height, t) -> (row, x, t).
pub fn x_profiles<T: Element>(
    store: &ChunkedStore,
    cropped: &Dataset<T>,
    config: &PipelineConfig,
) -> Result<Dataset<f64>> {
    let shape = cropped.shape();
    let (n_rows, x_dim, t_dim) = (shape[0], shape[2], shape[4]);
    let cols = &config.columns;

    store.apply(
        &[ChunkInput::new(cropped, 4)],
        config.t_chunk,
        &OutputSpec::new(X_PROFILE_KEY, vec![n_rows, x_dim, t_dim], 2),
        |range, arrays| {
            let chunk = view_as::<Ix5, _>(&arrays[0])?;
            let seg = chunk.index_axis(Axis(1), 0);
            let profiles = percentile_along(&seg, 2, cols.x_percentile);

            let mut out = Array3::<f64>::zeros((n_rows, x_dim, range.len()));
            for (row, profile) in profiles.axis_iter(Axis(0)).enumerate() {
                let background = median_filter_columns(profile, cols.background_kernel_x);
                let flattened = &profile - &background;
                let smoothed = median_filter_columns(flattened.view(), cols.smoothing_kernel_x);
                out.slice_mut(s![row, .., ..]).assign(&smoothed);
            }
            Ok(out.into_dyn())
        },
    )
}

/// Midpoints of the above-threshold runs of one x profile.
pub fn detect_midpoints(profile: ArrayView1<f64>, nbins: usize, scaling: f64) -> Vec<usize> {
    let values = profile.to_vec();
    let threshold = otsu_threshold(&values, nbins) * scaling;
    let mask: Vec<bool> = values.iter().map(|&v| v > threshold).collect();
    midpoints_from_mask(&mask)
}

/// Pair each rising transition with a falling one and return the midpoints.
///
/// Pairing starts at the first fall after the first rise, so a run already
/// open at the left border is skipped; unmatched transitions are ignored.
pub fn midpoints_from_mask(mask: &[bool]) -> Vec<usize> {
    let rises: Vec<usize> = mask
        .windows(2)
        .enumerate()
        .filter(|(_, w)| !w[0] && w[1])
        .map(|(i, _)| i)
        .collect();
    let falls: Vec<usize> = mask
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] && !w[1])
        .map(|(i, _)| i)
        .collect();

    let Some(&first_rise) = rises.first() else {
        return Vec::new();
    };
    let anchor = falls
        .iter()
        .position(|&f| f > first_rise)
        .unwrap_or(falls.len());
    rises
        .iter()
        .zip(&falls[anchor..])
        .map(|(&rise, &fall)| (rise + fall) / 2)
        .collect()
}

/// Accumulates the midpoint series of one row, timepoint by timepoint.
///
/// A timepoint that loses too many objects relative to the previous accepted
/// one is treated as a detection dropout and repeats the previous set.
pub struct MidpointTracker {
    row: usize,
    nbins: usize,
    scaling: f64,
    accepted: Vec<Vec<usize>>,
}

impl MidpointTracker {
    pub fn new(row: usize, columns: &ColumnConfig) -> Self {
        Self {
            row,
            nbins: columns.otsu_nbins,
            scaling: columns.otsu_scaling,
            accepted: Vec::new(),
        }
    }

    /// Detect the next timepoint's midpoints from its x profile.
    pub fn push(&mut self, profile: ArrayView1<f64>) -> Result<()> {
        let found = detect_midpoints(profile, self.nbins, self.scaling);
        self.accept(found)
    }

    /// Record already detected midpoints for the next timepoint.
    pub fn accept(&mut self, found: Vec<usize>) -> Result<()> {
        let t = self.accepted.len();
        let chosen = match self.accepted.last() {
            None if found.is_empty() => {
                return Err(KymoError::Detection(format!(
                    "no trenches found in row {} at the first timepoint",
                    self.row
                )));
            }
            None => found,
            Some(prev) => {
                let ratio = found.len() as f64 / (prev.len() as f64 + 1.0);
                if ratio < MIDPOINT_DROPOUT_RATIO {
                    warn!(
                        row = self.row,
                        t,
                        found = found.len(),
                        previous = prev.len(),
                        "Trench dropout, reusing previous midpoints"
                    );
                    prev.clone()
                } else {
                    found
                }
            }
        };
        self.accepted.push(chosen);
        Ok(())
    }

    pub fn timepoints(&self) -> usize {
        self.accepted.len()
    }

    pub fn finish(self) -> Vec<Vec<usize>> {
        self.accepted
    }
}

/// Midpoint series of every row, `[row][t]`, read in ascending time.
pub fn track_midpoints(
    profiles: &Dataset<f64>,
    config: &PipelineConfig,
) -> Result<Vec<Vec<Vec<usize>>>> {
    let n_rows = profiles.shape()[0];
    let mut trackers: Vec<MidpointTracker> = (0..n_rows)
        .map(|row| MidpointTracker::new(row, &config.columns))
        .collect();

    for window in profiles.windows(2, config.t_chunk) {
        let (_, chunk) = window?;
        let chunk = view_as::<Ix3, _>(&chunk)?;
        for (tracker, row) in trackers.iter_mut().zip(chunk.axis_iter(Axis(0))) {
            for profile in row.axis_iter(Axis(1)) {
                tracker.push(profile)?;
            }
        }
    }

    for tracker in &trackers {
        debug!(row = tracker.row, timepoints = tracker.timepoints(), "Midpoints tracked");
    }
    Ok(trackers.into_iter().map(MidpointTracker::finish).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(pattern: &str) -> Vec<bool> {
        pattern.chars().map(|c| c == '#').collect()
    }

    #[test]
    fn test_midpoints_pair_runs() {
        // Runs covering 2..=4 and 8..=11
        let m = mask("..###...####..");
        assert_eq!(midpoints_from_mask(&m), vec![(1 + 4) / 2, (7 + 11) / 2]);
    }

    #[test]
    fn test_open_left_run_skipped() {
        let m = mask("##...###..");
        assert_eq!(midpoints_from_mask(&m), vec![(4 + 7) / 2]);
    }

    #[test]
    fn test_unclosed_right_run_dropped() {
        let m = mask("..##...###");
        assert_eq!(midpoints_from_mask(&m), vec![(1 + 3) / 2]);
    }

    #[test]
    fn test_empty_mask() {
        assert!(midpoints_from_mask(&mask("......")).is_empty());
        assert!(midpoints_from_mask(&mask("######")).is_empty());
    }

    #[test]
    fn test_dropout_reuses_previous() {
        let mut tracker = MidpointTracker::new(0, &ColumnConfig::default());
        tracker.accept(vec![10, 50, 90, 130, 170]).unwrap();
        // 1 / (5 + 1) < 0.5
        tracker.accept(vec![52]).unwrap();
        // 3 / (5 + 1) = 0.5 is kept
        tracker.accept(vec![12, 52, 92]).unwrap();
        let series = tracker.finish();
        assert_eq!(series[1], vec![10, 50, 90, 130, 170]);
        assert_eq!(series[2], vec![12, 52, 92]);
    }

    #[test]
    fn test_no_trenches_at_start() {
        let mut tracker = MidpointTracker::new(3, &ColumnConfig::default());
        let err = tracker.accept(Vec::new()).unwrap_err();
        assert!(matches!(err, KymoError::Detection(_)));
    }
}
