use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::columns::{drift_series, track_midpoints, x_profiles, TrenchSet};
use crate::consts::LAYOUT_MANIFEST;
use crate::error::{KymoError, Result};
use crate::kymograph::write_kymographs;
use crate::rows::{crop_rows, detect_row_edges, smooth_y, y_percentiles};
use crate::store::{ChunkedStore, DType, Element};

use super::config::PipelineConfig;
use super::import::{import_channels, inspect_channels};
use super::types::{
    FieldLayout, FieldSpec, NoOpReporter, PipelineStage, ProgressReporter, RowLayout,
};

/// Scratch directory of one field, removed on drop whether the field
/// succeeded or not.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(path: PathBuf) -> Result<Self> {
        if path.exists() {
            warn!(path = %path.display(), "Removing stale scratch directory");
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch directory"),
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory"),
        }
    }
}

/// Extract every trench kymograph of one field.
pub fn generate_kymographs(field: &FieldSpec, config: &PipelineConfig) -> Result<FieldLayout> {
    generate_kymographs_reported(field, config, &NoOpReporter)
}

/// Extract every trench kymograph of one field, reporting progress.
///
/// The result lands in `<output_dir>/kymo_<fov>`, replacing an earlier
/// result. On failure nothing is written there and the scratch directory is
/// removed.
pub fn generate_kymographs_reported(
    field: &FieldSpec,
    config: &PipelineConfig,
    reporter: &dyn ProgressReporter,
) -> Result<FieldLayout> {
    config.validate()?;
    let input = ChunkedStore::open(&field.input)?;
    let header = inspect_channels(&input, &config.channels)?;
    info!(
        fov = field.fov,
        input = %field.input.display(),
        dtype = %header.dtype,
        shape = ?header.shape,
        "Processing field"
    );

    fs::create_dir_all(&field.output_dir)?;
    match header.dtype {
        DType::U8 => run_field::<u8>(field, config, &input, reporter),
        DType::U16 => run_field::<u16>(field, config, &input, reporter),
        DType::U32 => run_field::<u32>(field, config, &input, reporter),
        DType::F32 => run_field::<f32>(field, config, &input, reporter),
        DType::F64 => run_field::<f64>(field, config, &input, reporter),
    }
}

fn run_field<T: Element>(
    field: &FieldSpec,
    config: &PipelineConfig,
    input: &ChunkedStore,
    reporter: &dyn ProgressReporter,
) -> Result<FieldLayout> {
    let scratch_dir = ScratchDir::create(field.scratch_dir())?;
    let scratch = ChunkedStore::open_or_create(scratch_dir.path())?;

    reporter.begin_stage(PipelineStage::Importing, Some(config.channels.len()));
    let imported = import_channels::<T>(input, &scratch, config)?;
    let (x_dim, timepoints) = (imported.shape()[2], imported.shape()[3]);
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::RowDetection, None);
    let profile = y_percentiles(&scratch, &imported, config)?;
    let smoothed = smooth_y(&scratch, &profile, config)?;
    scratch.delete(profile)?;
    let row_edges = detect_row_edges(&smoothed, config)?;
    scratch.delete(smoothed)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::RowCropping, None);
    let (cropped, crop_height) = crop_rows(&scratch, &imported, &row_edges, config)?;
    scratch.delete(imported)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::TrenchDetection, None);
    let profiles = x_profiles(&scratch, &cropped, config)?;
    let midpoints = track_midpoints(&profiles, config)?;
    scratch.delete(profiles)?;
    reporter.finish_stage();

    let width = config.columns.trench_width_x;
    reporter.begin_stage(PipelineStage::DriftTracking, Some(midpoints.len()));
    let mut rows = Vec::with_capacity(midpoints.len());
    for (row, series) in midpoints.iter().enumerate() {
        let drift = drift_series(series);
        let first = series.first().map(Vec::as_slice).unwrap_or_default();
        let trenches = TrenchSet::select(first, &drift, width, x_dim);
        if trenches.is_empty() {
            return Err(KymoError::Detection(format!(
                "no trench in row {row} stays inside the frame"
            )));
        }
        debug!(
            row,
            candidates = first.len(),
            kept = trenches.len(),
            final_drift = drift.last().copied().unwrap_or(0),
            "Trenches selected"
        );
        rows.push((trenches, drift));
        reporter.advance(row + 1);
    }
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Kymographs, Some(rows.len()));
    let output_root = scratch_dir.path().join("output");
    let output = ChunkedStore::open_or_create(&output_root)?;
    for (row, (trenches, drift)) in rows.iter().enumerate() {
        let mask = trenches.mask(drift, x_dim);
        write_kymographs(&output, &cropped, row, &config.channels, &mask, config.t_chunk)?;
        reporter.advance(row + 1);
    }
    scratch.delete(cropped)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Finalizing, None);
    let layout = FieldLayout {
        fov: field.fov,
        channels: config.channels.clone(),
        timepoints,
        crop_height,
        trench_width: width,
        rows: rows
            .into_iter()
            .enumerate()
            .map(|(row, (trenches, drift))| RowLayout {
                row,
                orientation: config.rows.top_orientation.for_row(row),
                midpoints: trenches.midpoints,
                drift,
            })
            .collect(),
    };
    fs::write(
        output.root().join(LAYOUT_MANIFEST),
        toml::to_string_pretty(&layout)?,
    )?;
    publish(&output_root, &field.output_container())?;
    reporter.finish_stage();

    info!(
        fov = field.fov,
        rows = layout.rows.len(),
        kymographs = layout.kymograph_count(),
        output = %field.output_container().display(),
        "Field complete"
    );
    Ok(layout)
}

/// Move a finished output container into place, replacing an earlier one.
fn publish(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        debug!(path = %to.display(), "Replacing previous output");
        fs::remove_dir_all(to)?;
    }
    fs::rename(from, to)?;
    Ok(())
}

/// Read the layout manifest of a finished output container.
pub fn read_layout(output_container: &Path) -> Result<FieldLayout> {
    let text = fs::read_to_string(output_container.join(LAYOUT_MANIFEST))?;
    Ok(toml::from_str(&text)?)
}
