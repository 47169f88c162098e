/// Default crop length from the trench end, along y (pixels).
pub const DEFAULT_TRENCH_LEN_Y: usize = 270;

/// Default padding beyond the trench opening, along y (pixels).
pub const DEFAULT_PADDING_Y: usize = 20;

/// Default kymograph width along x (pixels).
pub const DEFAULT_TRENCH_WIDTH_X: usize = 30;

/// Default number of timepoints read and written per chunk.
pub const DEFAULT_T_CHUNK: usize = 1;

/// Default step when subsampling the input in time (1 keeps every frame).
pub const DEFAULT_T_SUBSAMPLE_STEP: usize = 1;

/// Default percentile used to collapse x when detecting rows.
pub const DEFAULT_Y_PERCENTILE: f64 = 85.0;

/// Default minimum row length along y; shorter rows are discarded.
pub const DEFAULT_Y_MIN_EDGE_DIST: usize = 50;

/// Default median kernel length along y for the row signal.
pub const DEFAULT_SMOOTHING_KERNEL_Y: usize = 9;

/// Default histogram bin count for the triangle threshold.
pub const DEFAULT_TRIANGLE_NBINS: usize = 50;

/// Default multiplier applied to the triangle threshold.
pub const DEFAULT_TRIANGLE_SCALING: f64 = 1.0;

/// Default percentile used to collapse y when detecting trenches.
pub const DEFAULT_X_PERCENTILE: f64 = 85.0;

/// Default median kernel length for x background estimation.
pub const DEFAULT_BACKGROUND_KERNEL_X: usize = 301;

/// Default median kernel length for x smoothing.
pub const DEFAULT_SMOOTHING_KERNEL_X: usize = 9;

/// Default histogram bin count for Otsu's threshold.
pub const DEFAULT_OTSU_NBINS: usize = 50;

/// Default multiplier applied to the Otsu threshold.
pub const DEFAULT_OTSU_SCALING: f64 = 1.0;

/// A timepoint's midpoints are replaced by the previous set when
/// `count / (previous + 1)` falls below this ratio.
pub const MIDPOINT_DROPOUT_RATIO: f64 = 0.5;

/// Magic bytes at the start of every dataset file.
pub const DATASET_MAGIC: &[u8; 8] = b"KYMOARR1";

/// Fixed part of the dataset header, before the per-axis extents.
pub const DATASET_HEADER_PREFIX: usize = 16;

/// File extension of a finalized dataset.
pub const DATASET_EXTENSION: &str = "kya";

/// Suffix appended to a dataset file while it is still being written.
pub const PARTIAL_SUFFIX: &str = "partial";

/// Name of the per-field layout manifest inside the output container.
pub const LAYOUT_MANIFEST: &str = "layout.toml";
