//! Row detection along y and cropping of every row to a fixed height.

pub mod crop;
pub mod detect;

pub use crop::{crop_rows, row_window, row_windows, CROPPED_KEY};
pub use detect::{
    detect_row_edges, paired_row_edges, row_count, smooth_y, transition_edges, y_percentiles,
    RowEdges, Y_PERCENTILE_KEY, Y_SMOOTHED_KEY,
};
