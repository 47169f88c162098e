//! Trench detection along x, drift tracking and the per-row trench masks.

pub mod detect;
pub mod drift;
pub mod mask;

pub use detect::{
    detect_midpoints, midpoints_from_mask, track_midpoints, x_profiles, MidpointTracker,
    X_PROFILE_KEY,
};
pub use drift::{drift_series, step_drift};
pub use mask::{TrenchMask, TrenchSet};
