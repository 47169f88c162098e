#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::{Array3, Axis};

use kymo_core::pipeline::{FieldSpec, PipelineConfig, TrenchOrientation};
use kymo_core::store::{ChunkedStore, Element};

pub const Y_DIM: usize = 200;
pub const X_DIM: usize = 240;
pub const T_DIM: usize = 6;

/// Row bands along y, `[start, end)`.
pub const BANDS: [(usize, usize); 2] = [(20, 80), (120, 180)];

/// Trench centres along x at the first timepoint.
pub const MIDS: [usize; 5] = [40, 80, 120, 160, 200];

/// Segmentation intensity inside a trench of a row band.
pub const BRIGHT: u16 = 1000;
/// Segmentation intensity everywhere else.
pub const DARK: u16 = 100;

pub const WIDTH: usize = 30;
pub const HEIGHT: usize = 60;

/// Top of the crop window of each row (OpenDown row 0, OpenUp row 1).
pub const ROW_TOPS: [usize; 2] = [14, 124];

/// Config matched to the synthetic field geometry.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig {
        channels: vec!["phase".into(), "fluor".into()],
        t_chunk: 2,
        ..PipelineConfig::default()
    };
    config.rows.trench_len_y = 55;
    config.rows.padding_y = 5;
    config.rows.y_min_edge_dist = 30;
    config.rows.top_orientation = TrenchOrientation::OpenDown;
    config.columns.trench_width_x = WIDTH;
    config.columns.background_kernel_x = 41;
    config.columns.smoothing_kernel_x = 3;
    config
}

/// Segmentation channel (y, x, t): bright trench interiors `[m - 6, m + 8)`
/// inside each row band, with every trench shifted by `shift[t]` along x.
///
/// `bands_at(t)` gives the row bands of timepoint `t`.
pub fn segmentation_with(shift: &[i64], bands_at: impl Fn(usize) -> Vec<(usize, usize)>) -> Array3<u16> {
    let t_dim = shift.len();
    let mut data = Array3::from_elem((Y_DIM, X_DIM, t_dim), DARK);
    for (t, &dx) in shift.iter().enumerate() {
        for (y0, y1) in bands_at(t) {
            for &m in &MIDS {
                let centre = m as i64 + dx;
                for x in (centre - 6)..(centre + 8) {
                    for y in y0..y1 {
                        data[[y, x as usize, t]] = BRIGHT;
                    }
                }
            }
        }
    }
    data
}

/// Segmentation channel without drift.
pub fn segmentation() -> Array3<u16> {
    segmentation_with(&[0; T_DIM], |_| BANDS.to_vec())
}

/// Non-segmentation channel with a pattern that differs at every pixel.
pub fn fluorescence(t_dim: usize) -> Array3<u16> {
    Array3::from_shape_fn((Y_DIM, X_DIM, t_dim), |(y, x, t)| {
        ((y * 7 + x * 3 + t * 11) % 251) as u16
    })
}

/// Write one input container holding the given (y, x, t) channels.
pub fn write_container<T: Element>(root: &Path, channels: &[(&str, &Array3<T>)]) {
    let store = ChunkedStore::open_or_create(root).expect("create container");
    for (name, data) in channels {
        let mut writer = store
            .create::<T>(name, data.shape(), 2)
            .expect("create channel");
        for t in 0..data.len_of(Axis(2)) {
            let slab = data.slice_axis(Axis(2), (t..t + 1).into()).to_owned();
            writer.append(&slab.into_dyn()).expect("append");
        }
        writer.finalize().expect("finalize");
    }
}

/// A temp directory laid out as an input prefix plus an output directory.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn prefix(&self) -> String {
        format!("{}/field_", self.dir.path().display())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn field(&self, fov: usize) -> FieldSpec {
        FieldSpec::from_prefix(&self.prefix(), &self.output_dir(), fov)
    }

    /// Write field `fov` with a segmentation and a fluorescence channel.
    pub fn write_field(&self, fov: usize, seg: &Array3<u16>) -> FieldSpec {
        let field = self.field(fov);
        let fluor = fluorescence(seg.len_of(Axis(2)));
        write_container(&field.input, &[("phase", seg), ("fluor", &fluor)]);
        field
    }
}

/// First column of the `WIDTH`-wide window around `mid` shifted by `drift`:
/// the window ends at `mid + drift + WIDTH / 2 + 1`.
pub fn window_start(mid: usize, drift: i64) -> usize {
    (mid as i64 + drift + (WIDTH / 2) as i64 + 1 - WIDTH as i64) as usize
}

/// Expected kymograph (height, width, t) of the trench centred on `mid` at
/// the first timepoint, in a row cropped from `top`.
pub fn expected_kymograph(
    channel: &Array3<u16>,
    top: usize,
    mid: usize,
    drift: &[i64],
) -> Array3<u16> {
    Array3::from_shape_fn((HEIGHT, WIDTH, drift.len()), |(yy, i, t)| {
        let x = window_start(mid, drift[t]) + i;
        channel[[top + yy, x, t]]
    })
}
