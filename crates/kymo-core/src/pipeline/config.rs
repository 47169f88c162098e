use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_BACKGROUND_KERNEL_X, DEFAULT_OTSU_NBINS, DEFAULT_OTSU_SCALING, DEFAULT_PADDING_Y,
    DEFAULT_SMOOTHING_KERNEL_X, DEFAULT_SMOOTHING_KERNEL_Y, DEFAULT_TRENCH_LEN_Y,
    DEFAULT_TRENCH_WIDTH_X, DEFAULT_TRIANGLE_NBINS, DEFAULT_TRIANGLE_SCALING, DEFAULT_T_CHUNK,
    DEFAULT_T_SUBSAMPLE_STEP, DEFAULT_X_PERCENTILE, DEFAULT_Y_MIN_EDGE_DIST, DEFAULT_Y_PERCENTILE,
};
use crate::error::{KymoError, Result};

/// Which way the trench opening faces in the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrenchOrientation {
    /// Opening at the top edge of the row; trenches extend downward.
    #[default]
    OpenDown,
    /// Opening at the bottom edge of the row; trenches extend upward.
    OpenUp,
}

impl TrenchOrientation {
    pub fn flipped(self) -> Self {
        match self {
            Self::OpenDown => Self::OpenUp,
            Self::OpenUp => Self::OpenDown,
        }
    }

    /// Orientation of row `row` when rows alternate starting from `self`.
    pub fn for_row(self, row: usize) -> Self {
        if row % 2 == 0 {
            self
        } else {
            self.flipped()
        }
    }
}

/// Everything one field's kymograph extraction needs besides its paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Channel names; the first is the segmentation channel.
    pub channels: Vec<String>,
    /// Timepoints read and written per chunk.
    #[serde(default = "default_t_chunk")]
    pub t_chunk: usize,
    /// Keep every n-th input timepoint.
    #[serde(default = "default_t_subsample_step")]
    pub t_subsample_step: usize,
    #[serde(default)]
    pub rows: RowConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channels: vec!["phase".into()],
            t_chunk: DEFAULT_T_CHUNK,
            t_subsample_step: DEFAULT_T_SUBSAMPLE_STEP,
            rows: RowConfig::default(),
            columns: ColumnConfig::default(),
        }
    }
}

/// Row detection and y-cropping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowConfig {
    /// Crop length from the trench opening into the trench.
    #[serde(default = "default_trench_len_y")]
    pub trench_len_y: usize,
    /// Crop margin beyond the trench opening.
    #[serde(default = "default_padding_y")]
    pub padding_y: usize,
    #[serde(default = "default_y_percentile")]
    pub y_percentile: f64,
    /// Rows not longer than this are dropped.
    #[serde(default = "default_y_min_edge_dist")]
    pub y_min_edge_dist: usize,
    #[serde(default = "default_smoothing_kernel_y")]
    pub smoothing_kernel_y: usize,
    #[serde(default = "default_triangle_nbins")]
    pub triangle_nbins: usize,
    #[serde(default = "default_triangle_scaling")]
    pub triangle_scaling: f64,
    /// Orientation of the first row; later rows alternate.
    #[serde(default)]
    pub top_orientation: TrenchOrientation,
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            trench_len_y: DEFAULT_TRENCH_LEN_Y,
            padding_y: DEFAULT_PADDING_Y,
            y_percentile: DEFAULT_Y_PERCENTILE,
            y_min_edge_dist: DEFAULT_Y_MIN_EDGE_DIST,
            smoothing_kernel_y: DEFAULT_SMOOTHING_KERNEL_Y,
            triangle_nbins: DEFAULT_TRIANGLE_NBINS,
            triangle_scaling: DEFAULT_TRIANGLE_SCALING,
            top_orientation: TrenchOrientation::default(),
        }
    }
}

/// Trench detection, drift tracking and kymograph width.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Width of every kymograph.
    #[serde(default = "default_trench_width_x")]
    pub trench_width_x: usize,
    #[serde(default = "default_x_percentile")]
    pub x_percentile: f64,
    #[serde(default = "default_background_kernel_x")]
    pub background_kernel_x: usize,
    #[serde(default = "default_smoothing_kernel_x")]
    pub smoothing_kernel_x: usize,
    #[serde(default = "default_otsu_nbins")]
    pub otsu_nbins: usize,
    #[serde(default = "default_otsu_scaling")]
    pub otsu_scaling: f64,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            trench_width_x: DEFAULT_TRENCH_WIDTH_X,
            x_percentile: DEFAULT_X_PERCENTILE,
            background_kernel_x: DEFAULT_BACKGROUND_KERNEL_X,
            smoothing_kernel_x: DEFAULT_SMOOTHING_KERNEL_X,
            otsu_nbins: DEFAULT_OTSU_NBINS,
            otsu_scaling: DEFAULT_OTSU_SCALING,
        }
    }
}

fn default_t_chunk() -> usize {
    DEFAULT_T_CHUNK
}
fn default_t_subsample_step() -> usize {
    DEFAULT_T_SUBSAMPLE_STEP
}
fn default_trench_len_y() -> usize {
    DEFAULT_TRENCH_LEN_Y
}
fn default_padding_y() -> usize {
    DEFAULT_PADDING_Y
}
fn default_y_percentile() -> f64 {
    DEFAULT_Y_PERCENTILE
}
fn default_y_min_edge_dist() -> usize {
    DEFAULT_Y_MIN_EDGE_DIST
}
fn default_smoothing_kernel_y() -> usize {
    DEFAULT_SMOOTHING_KERNEL_Y
}
fn default_triangle_nbins() -> usize {
    DEFAULT_TRIANGLE_NBINS
}
fn default_triangle_scaling() -> f64 {
    DEFAULT_TRIANGLE_SCALING
}
fn default_trench_width_x() -> usize {
    DEFAULT_TRENCH_WIDTH_X
}
fn default_x_percentile() -> f64 {
    DEFAULT_X_PERCENTILE
}
fn default_background_kernel_x() -> usize {
    DEFAULT_BACKGROUND_KERNEL_X
}
fn default_smoothing_kernel_x() -> usize {
    DEFAULT_SMOOTHING_KERNEL_X
}
fn default_otsu_nbins() -> usize {
    DEFAULT_OTSU_NBINS
}
fn default_otsu_scaling() -> f64 {
    DEFAULT_OTSU_SCALING
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings no field could be processed with.
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return invalid("at least one channel is required".into());
        }
        for (i, name) in self.channels.iter().enumerate() {
            if name.is_empty() || name.contains('/') {
                return invalid(format!("channel name '{name}' is not a valid dataset name"));
            }
            if self.channels[..i].contains(name) {
                return invalid(format!("channel '{name}' is listed twice"));
            }
        }
        if self.t_chunk == 0 {
            return invalid("t_chunk must be at least 1".into());
        }
        if self.t_subsample_step == 0 {
            return invalid("t_subsample_step must be at least 1".into());
        }

        let rows = &self.rows;
        check_percentile("rows.y_percentile", rows.y_percentile)?;
        check_kernel("rows.smoothing_kernel_y", rows.smoothing_kernel_y)?;
        check_bins("rows.triangle_nbins", rows.triangle_nbins)?;
        check_scaling("rows.triangle_scaling", rows.triangle_scaling)?;
        if rows.trench_len_y + rows.padding_y == 0 {
            return invalid("rows.trench_len_y + rows.padding_y must be positive".into());
        }

        let cols = &self.columns;
        if cols.trench_width_x == 0 {
            return invalid("columns.trench_width_x must be at least 1".into());
        }
        check_percentile("columns.x_percentile", cols.x_percentile)?;
        check_kernel("columns.background_kernel_x", cols.background_kernel_x)?;
        check_kernel("columns.smoothing_kernel_x", cols.smoothing_kernel_x)?;
        check_bins("columns.otsu_nbins", cols.otsu_nbins)?;
        check_scaling("columns.otsu_scaling", cols.otsu_scaling)?;
        Ok(())
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(KymoError::InvalidConfig(msg))
}

fn check_percentile(name: &str, q: f64) -> Result<()> {
    if (0.0..=100.0).contains(&q) {
        Ok(())
    } else {
        invalid(format!("{name} must be within [0, 100], got {q}"))
    }
}

fn check_kernel(name: &str, kernel: usize) -> Result<()> {
    if kernel % 2 == 1 {
        Ok(())
    } else {
        invalid(format!("{name} must be odd, got {kernel}"))
    }
}

fn check_bins(name: &str, bins: usize) -> Result<()> {
    if bins >= 2 {
        Ok(())
    } else {
        invalid(format!("{name} must be at least 2, got {bins}"))
    }
}

fn check_scaling(name: &str, scaling: f64) -> Result<()> {
    if scaling.is_finite() {
        Ok(())
    } else {
        invalid(format!("{name} must be finite, got {scaling}"))
    }
}
