//! Directory-backed container of chunked n-d datasets.
//!
//! Datasets are keyed by `/`-separated names (`"0/phase"`) and each lives in
//! its own file under the container root. [`ChunkedStore::apply`] is the
//! streaming primitive every pipeline stage is built from: it maps a
//! stateless transform over ordered windows of its inputs and writes the
//! results as a new dataset.

mod dataset;
mod element;

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayView, Dimension};
use tracing::debug;

use crate::consts::{DATASET_EXTENSION, PARTIAL_SUFFIX};
use crate::error::{KymoError, Result};

pub use dataset::{Dataset, DatasetHeader, DatasetWriter};
pub use element::{DType, Element};

/// One input of [`ChunkedStore::apply`]: a dataset and the axis to window it along.
pub struct ChunkInput<'a, T: Element> {
    pub dataset: &'a Dataset<T>,
    pub axis: usize,
}

impl<'a, T: Element> ChunkInput<'a, T> {
    pub fn new(dataset: &'a Dataset<T>, axis: usize) -> Self {
        Self { dataset, axis }
    }
}

/// Declared result of [`ChunkedStore::apply`].
#[derive(Clone, Debug)]
pub struct OutputSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub axis: usize,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, axis: usize) -> Self {
        Self {
            name: name.into(),
            shape,
            axis,
        }
    }
}

pub struct ChunkedStore {
    root: PathBuf,
}

impl ChunkedStore {
    /// Open a container directory, creating it if missing.
    pub fn open_or_create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Open an existing container.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(KymoError::InvalidStore(format!(
                "{} is not a container directory",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut parts = name.split('/').filter(|p| !p.is_empty()).peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                path.push(part);
            } else {
                path.push(format!("{part}.{DATASET_EXTENSION}"));
            }
        }
        path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dataset_path(name).is_file()
    }

    /// Start a new dataset. An existing dataset of the same name is replaced
    /// when the writer is finalized.
    pub fn create<T: Element>(
        &self,
        name: &str,
        shape: &[usize],
        chunk_axis: usize,
    ) -> Result<DatasetWriter<T>> {
        DatasetWriter::create(&self.dataset_path(name), shape, chunk_axis)
    }

    pub fn open_dataset<T: Element>(&self, name: &str) -> Result<Dataset<T>> {
        let path = self.dataset_path(name);
        if !path.is_file() {
            return Err(KymoError::InvalidStore(format!(
                "No dataset '{name}' in {}",
                self.root.display()
            )));
        }
        Dataset::open(&path)
    }

    /// Header of a dataset without committing to an element type.
    pub fn describe(&self, name: &str) -> Result<DatasetHeader> {
        DatasetHeader::read_from(&self.dataset_path(name))
    }

    /// Release a dataset's storage.
    pub fn delete<T: Element>(&self, dataset: Dataset<T>) -> Result<()> {
        let path = dataset.path().to_path_buf();
        drop(dataset);
        fs::remove_file(&path)?;
        debug!(path = %path.display(), "Deleted dataset");
        Ok(())
    }

    pub fn delete_key(&self, name: &str) -> Result<()> {
        fs::remove_file(self.dataset_path(name))?;
        Ok(())
    }

    /// Names of all finalized datasets, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        collect_keys(&self.root, "", &mut keys)?;
        keys.sort();
        Ok(keys)
    }

    /// Map `transform` over ordered windows of `inputs` and write the results
    /// as the dataset described by `output`.
    ///
    /// Every input is windowed along its own axis; all of those axes must
    /// have the same extent, which must also be the output's extent on
    /// `output.axis`. `transform` receives the window range and one array per
    /// input, and must return an array of the declared output shape with the
    /// window length on the output axis. It must not depend on other windows.
    ///
    /// On any failure the partially written output is removed.
    pub fn apply<T, U, F>(
        &self,
        inputs: &[ChunkInput<'_, T>],
        chunk_size: usize,
        output: &OutputSpec,
        transform: F,
    ) -> Result<Dataset<U>>
    where
        T: Element,
        U: Element,
        F: Fn(Range<usize>, &[ArrayD<T>]) -> Result<ArrayD<U>>,
    {
        let extent = chunk_extent(inputs)?;
        if output.axis >= output.shape.len() || output.shape[output.axis] != extent {
            return Err(KymoError::Layout(format!(
                "Output '{}' {:?} on axis {} does not match input extent {}",
                output.name, output.shape, output.axis, extent
            )));
        }

        let chunk_size = chunk_size.max(1);
        let mut writer = self.create::<U>(&output.name, &output.shape, output.axis)?;

        for start in (0..extent).step_by(chunk_size) {
            let window = start..(start + chunk_size).min(extent);
            let arrays = inputs
                .iter()
                .map(|input| input.dataset.read_window(input.axis, window.clone()))
                .collect::<Result<Vec<_>>>()?;

            let result = transform(window.clone(), &arrays)?;
            check_chunk_shape(result.shape(), output, window.len())?;
            writer.append(&result)?;
        }

        debug!(name = %output.name, shape = ?output.shape, chunk_size, "Chunked transform written");
        writer.finalize()
    }
}

/// View a chunk handed to a transform with a fixed dimensionality.
pub fn view_as<D: Dimension, T>(array: &ArrayD<T>) -> Result<ArrayView<'_, T, D>> {
    array.view().into_dimensionality::<D>().map_err(|e| {
        KymoError::Layout(format!("Chunk of shape {:?} has unexpected rank: {e}", array.shape()))
    })
}

fn chunk_extent<T: Element>(inputs: &[ChunkInput<'_, T>]) -> Result<usize> {
    let first = inputs
        .first()
        .ok_or_else(|| KymoError::Layout("Chunked transform needs at least one input".into()))?;
    let extent = axis_extent(first)?;
    for input in &inputs[1..] {
        let other = axis_extent(input)?;
        if other != extent {
            return Err(KymoError::Layout(format!(
                "Inputs disagree on chunked extent: {extent} vs {other}"
            )));
        }
    }
    Ok(extent)
}

fn axis_extent<T: Element>(input: &ChunkInput<'_, T>) -> Result<usize> {
    input.dataset.shape().get(input.axis).copied().ok_or_else(|| {
        KymoError::Layout(format!(
            "Axis {} out of range for shape {:?}",
            input.axis,
            input.dataset.shape()
        ))
    })
}

fn check_chunk_shape(got: &[usize], output: &OutputSpec, window_len: usize) -> Result<()> {
    let ok = got.len() == output.shape.len()
        && got.iter().zip(&output.shape).enumerate().all(|(a, (&g, &want))| {
            if a == output.axis {
                g == window_len
            } else {
                g == want
            }
        });
    if ok {
        Ok(())
    } else {
        Err(KymoError::Layout(format!(
            "Transform for '{}' returned shape {:?}, expected {:?} with {} on axis {}",
            output.name, got, output.shape, window_len, output.axis
        )))
    }
}

fn collect_keys(dir: &Path, prefix: &str, keys: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() {
            collect_keys(&path, &format!("{prefix}{name}/"), keys)?;
        } else if let Some(stem) = name.strip_suffix(&format!(".{DATASET_EXTENSION}")) {
            keys.push(format!("{prefix}{stem}"));
        } else if name.ends_with(PARTIAL_SUFFIX) {
            debug!(path = %path.display(), "Skipping partial dataset");
        }
    }
    Ok(())
}
