//! Gathering of fixed-width per-trench image sequences.

use ndarray::{s, Array4, ArrayView2, ArrayView3, Axis, Ix5};
use tracing::debug;

use crate::columns::TrenchMask;
use crate::error::{KymoError, Result};
use crate::store::{view_as, ChunkInput, ChunkedStore, Dataset, Element, OutputSpec};

/// Dataset name of the kymographs of one row and channel.
pub fn kymograph_key(row: usize, channel: &str) -> String {
    format!("{row}/{channel}")
}

/// Split the masked columns of `plane` into `objects` runs of `width`.
///
/// `plane` is (x, height, t) and `mask` is (x, t) over the same timepoints.
/// The result is (object, height, width, t).
pub fn gather_objects<T: Element>(
    plane: ArrayView3<T>,
    mask: ArrayView2<bool>,
    objects: usize,
    width: usize,
) -> Result<Array4<T>> {
    let (_, height, t_len) = plane.dim();
    let mut out = Array4::<T>::default((objects, height, width, t_len));

    for (t, column) in mask.axis_iter(Axis(1)).enumerate() {
        let selected: Vec<usize> = column
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .map(|(x, _)| x)
            .collect();
        if selected.len() != objects * width {
            return Err(KymoError::Layout(format!(
                "mask selects {} columns, expected {objects} objects of width {width}",
                selected.len()
            )));
        }

        for (i, &x) in selected.iter().enumerate() {
            let (j, col) = (i / width, i % width);
            out.slice_mut(s![j, .., col, t])
                .assign(&plane.slice(s![x, .., t]));
        }
    }
    Ok(out)
}

/// Write the kymographs of `row` for every channel of `cropped`
/// (row, c, x, height, t) into `output` as `"<row>/<channel>"`.
pub fn write_kymographs<T: Element>(
    output: &ChunkedStore,
    cropped: &Dataset<T>,
    row: usize,
    channels: &[String],
    mask: &TrenchMask,
    t_chunk: usize,
) -> Result<()> {
    let shape = cropped.shape();
    let (height, t_dim) = (shape[3], shape[4]);
    if mask.timepoints() != t_dim {
        return Err(KymoError::Layout(format!(
            "mask covers {} timepoints, data has {t_dim}",
            mask.timepoints()
        )));
    }
    let (objects, width) = (mask.objects(), mask.width());
    let mask_view = mask.view();

    for (c, channel) in channels.iter().enumerate() {
        let key = kymograph_key(row, channel);
        output.apply(
            &[ChunkInput::new(cropped, 4)],
            t_chunk,
            &OutputSpec::new(key.as_str(), vec![objects, height, width, t_dim], 3),
            |range, arrays| {
                let chunk = view_as::<Ix5, _>(&arrays[0])?;
                let plane = chunk.slice(s![row, c, .., .., ..]);
                let window_mask = mask_view.slice(s![.., range.start..range.end]);
                Ok(gather_objects(plane, window_mask, objects, width)?.into_dyn())
            },
        )?;
        debug!(key = %key, objects, "Kymographs written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_gather_splits_runs() {
        // x = 6, height = 1, t = 1; values equal their x position.
        let plane = Array3::from_shape_fn((6, 1, 1), |(x, _, _)| x as u16);
        let mut mask = ndarray::Array2::from_elem((6, 1), false);
        for x in [1, 2, 4, 5] {
            mask[[x, 0]] = true;
        }
        let out = gather_objects(plane.view(), mask.view(), 2, 2).unwrap();
        assert_eq!(out.dim(), (2, 1, 2, 1));
        assert_eq!(out[[0, 0, 0, 0]], 1);
        assert_eq!(out[[0, 0, 1, 0]], 2);
        assert_eq!(out[[1, 0, 0, 0]], 4);
        assert_eq!(out[[1, 0, 1, 0]], 5);
    }

    #[test]
    fn test_gather_rejects_count_mismatch() {
        let plane = Array3::<u16>::zeros((6, 1, 1));
        let mut mask = ndarray::Array2::from_elem((6, 1), false);
        mask[[0, 0]] = true;
        let err = gather_objects(plane.view(), mask.view(), 1, 2).unwrap_err();
        assert!(matches!(err, KymoError::Layout(_)));
    }
}
