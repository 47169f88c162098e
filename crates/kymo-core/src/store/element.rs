use std::fmt;
use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// Element type of a stored dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    U8,
    U16,
    U32,
    F32,
    F64,
}

impl DType {
    pub fn code(self) -> u8 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 3,
            Self::F32 => 4,
            Self::F64 => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::U8),
            2 => Some(Self::U16),
            3 => Some(Self::U32),
            4 => Some(Self::F32),
            5 => Some(Self::F64),
            _ => None,
        }
    }

    /// Bytes per element.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

/// A scalar that can live in a dataset: little-endian on disk, and
/// convertible to `f64` for the detection kernels.
pub trait Element:
    AsPrimitive<f64> + Copy + Default + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    const DTYPE: DType;

    fn write_le<W: Write>(self, w: &mut W) -> std::io::Result<()>;

    /// Decode one element from exactly `DTYPE.size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

impl Element for u8 {
    const DTYPE: DType = DType::U8;

    fn write_le<W: Write>(self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self)
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr, $write:ident, $read:ident) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn write_le<W: Write>(self, w: &mut W) -> std::io::Result<()> {
                w.$write::<LittleEndian>(self)
            }

            fn read_le(bytes: &[u8]) -> Self {
                LittleEndian::$read(bytes)
            }
        }
    };
}

impl_element!(u16, DType::U16, write_u16, read_u16);
impl_element!(u32, DType::U32, write_u32, read_u32);
impl_element!(f32, DType::F32, write_f32, read_f32);
impl_element!(f64, DType::F64, write_f64, read_f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_codes_round_trip() {
        for dtype in [DType::U8, DType::U16, DType::U32, DType::F32, DType::F64] {
            assert_eq!(DType::from_code(dtype.code()), Some(dtype));
        }
        assert_eq!(DType::from_code(0), None);
    }

    #[test]
    fn test_u16_little_endian() {
        let mut buf = Vec::new();
        0x1234u16.write_le(&mut buf).unwrap();
        assert_eq!(buf, vec![0x34, 0x12]);
        assert_eq!(u16::read_le(&buf), 0x1234);
    }
}
