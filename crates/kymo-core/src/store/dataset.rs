use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use tracing::debug;

use crate::consts::{DATASET_HEADER_PREFIX, DATASET_MAGIC, PARTIAL_SUFFIX};
use crate::error::{KymoError, Result};

use super::element::{DType, Element};

/// Dataset header: dtype, logical shape and the axis data is chunked along.
///
/// On disk the chunk axis is stored outermost, so any window along it is a
/// single contiguous byte range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetHeader {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub chunk_axis: usize,
}

impl DatasetHeader {
    pub fn byte_size(&self) -> usize {
        DATASET_HEADER_PREFIX + 8 * self.shape.len()
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Elements in one unit step along the chunk axis.
    pub fn slab_len(&self) -> usize {
        self.shape
            .iter()
            .enumerate()
            .filter(|&(axis, _)| axis != self.chunk_axis)
            .map(|(_, &n)| n)
            .product()
    }

    /// Logical axes in on-disk order: chunk axis first, the rest ascending.
    pub(crate) fn storage_order(&self) -> Vec<usize> {
        std::iter::once(self.chunk_axis)
            .chain((0..self.shape.len()).filter(|&a| a != self.chunk_axis))
            .collect()
    }

    pub(crate) fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(DATASET_MAGIC)?;
        w.write_u8(self.dtype.code())?;
        w.write_u8(self.shape.len() as u8)?;
        w.write_u8(self.chunk_axis as u8)?;
        // Reserved
        w.write_all(&[0u8; 5])?;
        for &dim in &self.shape {
            w.write_u64::<LittleEndian>(dim as u64)?;
        }
        Ok(())
    }

    pub(crate) fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < DATASET_HEADER_PREFIX {
            return Err(KymoError::InvalidStore(
                "File too small for dataset header".into(),
            ));
        }
        if &buf[..8] != DATASET_MAGIC {
            return Err(KymoError::InvalidStore("Missing dataset magic".into()));
        }

        let mut cursor = Cursor::new(&buf[8..]);
        let code = cursor.read_u8()?;
        let rank = cursor.read_u8()? as usize;
        let chunk_axis = cursor.read_u8()? as usize;
        let dtype = DType::from_code(code)
            .ok_or_else(|| KymoError::InvalidStore(format!("Unknown dtype code {code}")))?;

        if rank == 0 || chunk_axis >= rank {
            return Err(KymoError::InvalidStore(format!(
                "Invalid rank {rank} / chunk axis {chunk_axis}"
            )));
        }
        if buf.len() < DATASET_HEADER_PREFIX + 8 * rank {
            return Err(KymoError::InvalidStore("Truncated dataset header".into()));
        }

        let mut cursor = Cursor::new(&buf[DATASET_HEADER_PREFIX..]);
        let mut shape = Vec::with_capacity(rank);
        for _ in 0..rank {
            shape.push(cursor.read_u64::<LittleEndian>()? as usize);
        }

        Ok(Self {
            dtype,
            shape,
            chunk_axis,
        })
    }

    /// Read only the header of a dataset file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut prefix = [0u8; DATASET_HEADER_PREFIX];
        file.read_exact(&mut prefix)?;
        let rank = prefix[9] as usize;
        let mut buf = prefix.to_vec();
        buf.resize(DATASET_HEADER_PREFIX + 8 * rank, 0);
        file.read_exact(&mut buf[DATASET_HEADER_PREFIX..])?;
        Self::parse(&buf)
    }
}

/// A finalized, read-only, memory-mapped dataset.
pub struct Dataset<T: Element> {
    mmap: Mmap,
    header: DatasetHeader,
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Element> fmt::Debug for Dataset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl<T: Element> Dataset<T> {
    /// Open a dataset file, checking that its dtype matches `T`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let header = DatasetHeader::parse(&mmap)?;

        if header.dtype != T::DTYPE {
            return Err(KymoError::InvalidStore(format!(
                "{}: stored as {}, requested {}",
                path.display(),
                header.dtype,
                T::DTYPE
            )));
        }

        let expected = header.byte_size() + header.element_count() * T::DTYPE.size();
        if mmap.len() != expected {
            return Err(KymoError::InvalidStore(format!(
                "{}: expected {} bytes, got {}",
                path.display(),
                expected,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            header,
            path: path.to_path_buf(),
            _marker: PhantomData,
        })
    }

    pub fn header(&self) -> &DatasetHeader {
        &self.header
    }

    pub fn shape(&self) -> &[usize] {
        &self.header.shape
    }

    pub fn ndim(&self) -> usize {
        self.header.shape.len()
    }

    pub fn chunk_axis(&self) -> usize {
        self.header.chunk_axis
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a window `range` along `axis`.
    ///
    /// Windows along the chunk axis are decoded straight from the mapped
    /// range; any other axis decodes the whole array and slices it.
    pub fn read_window(&self, axis: usize, range: Range<usize>) -> Result<ArrayD<T>> {
        if axis >= self.ndim() || range.start > range.end || range.end > self.shape()[axis] {
            return Err(KymoError::Layout(format!(
                "Window {:?} on axis {} is outside shape {:?}",
                range,
                axis,
                self.shape()
            )));
        }

        if axis == self.header.chunk_axis {
            return self.decode_slabs(range);
        }

        debug!(
            path = %self.path.display(),
            axis,
            "Reading across the chunk axis, decoding full dataset"
        );
        let full = self.decode_slabs(0..self.shape()[self.header.chunk_axis])?;
        Ok(full
            .slice_axis(Axis(axis), Slice::from(range))
            .to_owned())
    }

    /// Decode the whole dataset.
    pub fn read_all(&self) -> Result<ArrayD<T>> {
        self.decode_slabs(0..self.shape()[self.header.chunk_axis])
    }

    /// Iterate over consecutive windows of at most `size` along `axis`, in
    /// ascending order.
    pub fn windows(
        &self,
        axis: usize,
        size: usize,
    ) -> impl Iterator<Item = Result<(Range<usize>, ArrayD<T>)>> + '_ {
        let extent = self.shape().get(axis).copied().unwrap_or(0);
        let size = size.max(1);
        (0..extent).step_by(size).map(move |start| {
            let range = start..(start + size).min(extent);
            self.read_window(axis, range.clone()).map(|arr| (range, arr))
        })
    }

    fn decode_slabs(&self, range: Range<usize>) -> Result<ArrayD<T>> {
        let elem = T::DTYPE.size();
        let slab = self.header.slab_len();
        let offset = self.header.byte_size() + range.start * slab * elem;
        let end = offset + range.len() * slab * elem;
        let values: Vec<T> = self.mmap[offset..end]
            .chunks_exact(elem)
            .map(T::read_le)
            .collect();

        let order = self.header.storage_order();
        let mut stored_shape: Vec<usize> = order.iter().map(|&a| self.header.shape[a]).collect();
        stored_shape[0] = range.len();
        let stored = ArrayD::from_shape_vec(IxDyn(&stored_shape), values)
            .map_err(|e| KymoError::InvalidStore(format!("{}: {e}", self.path.display())))?;

        // Undo the storage permutation: logical axis `a` sits at position
        // `inverse[a]` of the stored array.
        let mut inverse = vec![0usize; order.len()];
        for (pos, &a) in order.iter().enumerate() {
            inverse[a] = pos;
        }
        Ok(stored
            .permuted_axes(IxDyn(&inverse))
            .as_standard_layout()
            .into_owned())
    }
}

/// Append-only writer for a new dataset.
///
/// Data goes to a `.partial` file that is renamed into place by
/// [`DatasetWriter::finalize`]. A writer dropped before finalizing removes
/// its partial file.
pub struct DatasetWriter<T: Element> {
    writer: Option<BufWriter<File>>,
    header: DatasetHeader,
    partial_path: PathBuf,
    final_path: PathBuf,
    written: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> DatasetWriter<T> {
    pub(crate) fn create(path: &Path, shape: &[usize], chunk_axis: usize) -> Result<Self> {
        if shape.is_empty() || chunk_axis >= shape.len() || shape.len() > u8::MAX as usize {
            return Err(KymoError::Layout(format!(
                "Cannot create dataset of shape {shape:?} chunked on axis {chunk_axis}"
            )));
        }

        let header = DatasetHeader {
            dtype: T::DTYPE,
            shape: shape.to_vec(),
            chunk_axis,
        };
        let partial_path = partial_path_for(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&partial_path)?;
        let mut writer = BufWriter::new(file);
        header.write_to(&mut writer)?;

        Ok(Self {
            writer: Some(writer),
            header,
            partial_path,
            final_path: path.to_path_buf(),
            written: 0,
            _marker: PhantomData,
        })
    }

    pub fn header(&self) -> &DatasetHeader {
        &self.header
    }

    /// Number of steps written so far along the chunk axis.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Append the next chunk. Its extent on the chunk axis may be anything
    /// that still fits; every other axis must match the declared shape.
    pub fn append(&mut self, chunk: &ArrayD<T>) -> Result<()> {
        let axis = self.header.chunk_axis;
        let declared = &self.header.shape;
        let shape = chunk.shape();

        let matches = shape.len() == declared.len()
            && shape
                .iter()
                .zip(declared)
                .enumerate()
                .all(|(a, (&got, &want))| a == axis || got == want);
        if !matches {
            return Err(KymoError::Layout(format!(
                "Chunk of shape {shape:?} does not fit dataset {declared:?} (chunk axis {axis})"
            )));
        }
        if self.written + shape[axis] > declared[axis] {
            return Err(KymoError::Layout(format!(
                "Chunk overruns axis {axis}: {} + {} > {}",
                self.written, shape[axis], declared[axis]
            )));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| KymoError::InvalidStore("Writer already closed".into()))?;
        let stored = chunk
            .view()
            .permuted_axes(IxDyn(&self.header.storage_order()));
        for &v in stored.iter() {
            v.write_le(writer)?;
        }
        self.written += shape[axis];
        Ok(())
    }

    /// Flush and move the dataset into place. Fails if fewer steps than
    /// declared were written.
    pub fn finalize(mut self) -> Result<Dataset<T>> {
        let axis = self.header.chunk_axis;
        if self.written != self.header.shape[axis] {
            return Err(KymoError::Layout(format!(
                "Dataset incomplete: {} of {} steps written on axis {axis}",
                self.written, self.header.shape[axis]
            )));
        }
        let moved = self
            .writer
            .take()
            .map_or(Ok(()), |mut writer| writer.flush())
            .and_then(|_| fs::rename(&self.partial_path, &self.final_path));
        if let Err(e) = moved {
            let _ = fs::remove_file(&self.partial_path);
            return Err(e.into());
        }
        Dataset::open(&self.final_path)
    }
}

impl<T: Element> Drop for DatasetWriter<T> {
    fn drop(&mut self) {
        // Only an unfinalized writer still owns its buffer.
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.partial_path);
        }
    }
}

fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
