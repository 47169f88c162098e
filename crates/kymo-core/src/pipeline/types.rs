use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::config::TrenchOrientation;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Importing,
    RowDetection,
    RowCropping,
    TrenchDetection,
    DriftTracking,
    Kymographs,
    Finalizing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Importing => write!(f, "Importing channels"),
            Self::RowDetection => write!(f, "Detecting rows"),
            Self::RowCropping => write!(f, "Cropping rows"),
            Self::TrenchDetection => write!(f, "Detecting trenches"),
            Self::DriftTracking => write!(f, "Tracking drift"),
            Self::Kymographs => write!(f, "Writing kymographs"),
            Self::Finalizing => write!(f, "Finalizing output"),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g. rows), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Progress reporter that ignores everything.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Where one field of view is read from and written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub fov: usize,
    /// Input container holding one (y, x, t) dataset per channel.
    pub input: PathBuf,
    /// Directory receiving the `kymo_<fov>` output container.
    pub output_dir: PathBuf,
}

impl FieldSpec {
    /// Field `fov` read from the container `<input_prefix><fov>`.
    pub fn from_prefix(input_prefix: &str, output_dir: &Path, fov: usize) -> Self {
        Self {
            fov,
            input: PathBuf::from(format!("{input_prefix}{fov}")),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Final output container.
    pub fn output_container(&self) -> PathBuf {
        self.output_dir.join(format!("kymo_{}", self.fov))
    }

    /// Working directory for intermediates, removed when the field finishes.
    pub fn scratch_dir(&self) -> PathBuf {
        self.output_dir.join(format!(".tmp_kymo_{}", self.fov))
    }
}

/// Summary of one processed field, written as the output's layout manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub fov: usize,
    pub channels: Vec<String>,
    pub timepoints: usize,
    /// Height of every kymograph (cropped y extent).
    pub crop_height: usize,
    /// Width of every kymograph.
    pub trench_width: usize,
    pub rows: Vec<RowLayout>,
}

impl FieldLayout {
    pub fn kymograph_count(&self) -> usize {
        self.rows.iter().map(|r| r.midpoints.len()).sum()
    }
}

/// One row of a [`FieldLayout`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowLayout {
    pub row: usize,
    pub orientation: TrenchOrientation,
    /// First-frame midpoints of the kept trenches, one kymograph each.
    pub midpoints: Vec<usize>,
    /// Cumulative x drift per timepoint.
    pub drift: Vec<i64>,
}
