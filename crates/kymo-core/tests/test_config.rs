use approx::assert_relative_eq;

use kymo_core::error::KymoError;
use kymo_core::pipeline::{PipelineConfig, PipelineStage, TrenchOrientation};

fn assert_rejected(config: &PipelineConfig) {
    let err = config.validate().unwrap_err();
    assert!(matches!(err, KymoError::InvalidConfig(_)), "{err}");
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_row_defaults() {
    let rows = PipelineConfig::default().rows;
    assert_eq!(rows.trench_len_y, 270);
    assert_eq!(rows.padding_y, 20);
    assert_relative_eq!(rows.y_percentile, 85.0);
    assert_eq!(rows.y_min_edge_dist, 50);
    assert_eq!(rows.smoothing_kernel_y, 9);
    assert_eq!(rows.triangle_nbins, 50);
    assert_relative_eq!(rows.triangle_scaling, 1.0);
    assert_eq!(rows.top_orientation, TrenchOrientation::OpenDown);
}

#[test]
fn test_column_defaults() {
    let cols = PipelineConfig::default().columns;
    assert_eq!(cols.trench_width_x, 30);
    assert_relative_eq!(cols.x_percentile, 85.0);
    assert_eq!(cols.background_kernel_x, 301);
    assert_eq!(cols.smoothing_kernel_x, 9);
    assert_eq!(cols.otsu_nbins, 50);
    assert_relative_eq!(cols.otsu_scaling, 1.0);
}

#[test]
fn test_default_is_valid() {
    let config = PipelineConfig::default();
    assert_eq!(config.t_chunk, 1);
    assert_eq!(config.t_subsample_step, 1);
    assert!(config.validate().is_ok());
}

// ---------------------------------------------------------------------------
// TOML
// ---------------------------------------------------------------------------

#[test]
fn test_partial_toml_fills_defaults() {
    let config = PipelineConfig::from_toml(
        r#"
channels = ["phase", "gfp"]
t_chunk = 8

[columns]
trench_width_x = 24
"#,
    )
    .unwrap();
    assert_eq!(config.channels, vec!["phase", "gfp"]);
    assert_eq!(config.t_chunk, 8);
    assert_eq!(config.t_subsample_step, 1);
    assert_eq!(config.columns.trench_width_x, 24);
    assert_eq!(config.columns.background_kernel_x, 301);
    assert_eq!(config.rows.trench_len_y, 270);
}

#[test]
fn test_toml_round_trip() {
    let mut config = PipelineConfig {
        channels: vec!["phase".into(), "mcherry".into()],
        t_chunk: 16,
        ..PipelineConfig::default()
    };
    config.rows.top_orientation = TrenchOrientation::OpenUp;
    config.columns.otsu_scaling = 0.8;

    let parsed = PipelineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
    assert_eq!(parsed.channels, config.channels);
    assert_eq!(parsed.t_chunk, 16);
    assert_eq!(parsed.rows.top_orientation, TrenchOrientation::OpenUp);
    assert_relative_eq!(parsed.columns.otsu_scaling, 0.8);
}

#[test]
fn test_toml_without_channels_fails() {
    let err = PipelineConfig::from_toml("t_chunk = 4\n").unwrap_err();
    assert!(matches!(err, KymoError::Config(_)), "{err}");
}

#[test]
fn test_toml_with_invalid_values_fails() {
    let err = PipelineConfig::from_toml("channels = [\"phase\"]\nt_chunk = 0\n").unwrap_err();
    assert!(matches!(err, KymoError::InvalidConfig(_)), "{err}");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_channel_list_rejections() {
    let mut config = PipelineConfig::default();
    config.channels.clear();
    assert_rejected(&config);

    config.channels = vec!["phase".into(), "phase".into()];
    assert_rejected(&config);

    config.channels = vec!["phase/raw".into()];
    assert_rejected(&config);
}

#[test]
fn test_even_kernels_rejected() {
    let mut config = PipelineConfig::default();
    config.rows.smoothing_kernel_y = 8;
    assert_rejected(&config);

    let mut config = PipelineConfig::default();
    config.columns.background_kernel_x = 300;
    assert_rejected(&config);
}

#[test]
fn test_out_of_range_values_rejected() {
    let mut config = PipelineConfig::default();
    config.rows.y_percentile = 101.0;
    assert_rejected(&config);

    let mut config = PipelineConfig::default();
    config.columns.otsu_nbins = 1;
    assert_rejected(&config);

    let mut config = PipelineConfig::default();
    config.rows.triangle_scaling = f64::NAN;
    assert_rejected(&config);

    let mut config = PipelineConfig::default();
    config.columns.trench_width_x = 0;
    assert_rejected(&config);

    let mut config = PipelineConfig::default();
    config.t_subsample_step = 0;
    assert_rejected(&config);
}

// ---------------------------------------------------------------------------
// TrenchOrientation / PipelineStage
// ---------------------------------------------------------------------------

#[test]
fn test_orientation_alternates_by_row() {
    let top = TrenchOrientation::OpenUp;
    assert_eq!(top.for_row(0), TrenchOrientation::OpenUp);
    assert_eq!(top.for_row(1), TrenchOrientation::OpenDown);
    assert_eq!(top.for_row(4), TrenchOrientation::OpenUp);
    assert_eq!(top.flipped().flipped(), top);
}

#[test]
fn test_pipeline_stage_display() {
    assert_eq!(format!("{}", PipelineStage::Importing), "Importing channels");
    assert_eq!(format!("{}", PipelineStage::DriftTracking), "Tracking drift");
    assert_eq!(format!("{}", PipelineStage::Kymographs), "Writing kymographs");
}
