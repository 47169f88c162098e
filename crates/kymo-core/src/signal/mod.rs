//! One-dimensional signal kernels shared by the row and column detectors.

mod median;
mod percentile;
mod threshold;

pub use median::{median_filter, median_filter_columns, median_filter_edges};
pub use percentile::{percentile, percentile_along};
pub use threshold::{otsu_threshold, triangle_threshold};
