use ndarray::{Array4, Axis, Ix3, Slice};
use tracing::{debug, info};

use crate::error::{KymoError, Result};
use crate::store::{view_as, ChunkedStore, Dataset, DatasetHeader, Element};

use super::config::PipelineConfig;

pub const IMPORTED_KEY: &str = "imported";

/// Check that every channel of a field exists, is chunked along t and shares
/// one dtype and shape.
///
/// Returns the segmentation channel's header.
pub fn inspect_channels(input: &ChunkedStore, channels: &[String]) -> Result<DatasetHeader> {
    let mut first: Option<DatasetHeader> = None;
    for name in channels {
        if !input.contains(name) {
            return Err(KymoError::InvalidStore(format!(
                "channel '{name}' missing from {}",
                input.root().display()
            )));
        }
        let header = input.describe(name)?;
        if header.shape.len() != 3 {
            return Err(KymoError::Layout(format!(
                "channel '{name}' has shape {:?}, expected (y, x, t)",
                header.shape
            )));
        }
        if header.chunk_axis != 2 {
            return Err(KymoError::Layout(format!(
                "channel '{name}' is chunked along axis {}, expected t (axis 2)",
                header.chunk_axis
            )));
        }
        match &first {
            None => first = Some(header),
            Some(seg) if seg.dtype != header.dtype || seg.shape != header.shape => {
                return Err(KymoError::Layout(format!(
                    "channel '{name}' is {} {:?}, segmentation channel is {} {:?}",
                    header.dtype, header.shape, seg.dtype, seg.shape
                )));
            }
            Some(_) => {}
        }
    }
    first.ok_or_else(|| KymoError::InvalidConfig("no channels configured".into()))
}

/// Stack the configured channels into one (c, y, x, t) dataset, keeping every
/// `t_subsample_step`-th timepoint.
pub fn import_channels<T: Element>(
    input: &ChunkedStore,
    scratch: &ChunkedStore,
    config: &PipelineConfig,
) -> Result<Dataset<T>> {
    let sources = config
        .channels
        .iter()
        .map(|name| input.open_dataset::<T>(name))
        .collect::<Result<Vec<_>>>()?;
    let &[y_dim, x_dim, t_in] = sources
        .first()
        .map(|d| d.shape())
        .ok_or_else(|| KymoError::InvalidConfig("no channels configured".into()))?
    else {
        return Err(KymoError::Layout(
            "segmentation channel is not (y, x, t)".into(),
        ));
    };

    let step = config.t_subsample_step;
    let t_out = t_in.div_ceil(step);
    if t_out == 0 {
        return Err(KymoError::Detection("input has no timepoints".into()));
    }

    let channels = sources.len();
    let mut writer = scratch.create::<T>(IMPORTED_KEY, &[channels, y_dim, x_dim, t_out], 3)?;
    for start in (0..t_out).step_by(config.t_chunk) {
        let end = (start + config.t_chunk).min(t_out);
        let source = start * step..(end - 1) * step + 1;

        let mut chunk = Array4::<T>::default((channels, y_dim, x_dim, end - start));
        for (c, dataset) in sources.iter().enumerate() {
            let window = dataset.read_window(2, source.clone())?;
            let window = view_as::<Ix3, _>(&window)?;
            let kept = window.slice_axis(Axis(2), Slice::new(0, None, step as isize));
            chunk.index_axis_mut(Axis(0), c).assign(&kept);
        }
        writer.append(&chunk.into_dyn())?;
        debug!(start, end, "Imported chunk");
    }

    let imported = writer.finalize()?;
    info!(
        channels,
        y = y_dim,
        x = x_dim,
        timepoints = t_out,
        step,
        "Channels imported"
    );
    Ok(imported)
}
