use std::fmt;
use std::str::FromStr;

use half::f16;

use crate::disk::HEADER_LEN;
use crate::IndexError;

pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 14;
pub const DEFAULT_RESIZE_INCREMENT: usize = 1 << 10;

/// Element type of the persisted vector array. Callers always exchange `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageDtype {
    #[default]
    F32,
    F16,
}

impl StorageDtype {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::F32 => 0,
            Self::F16 => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::F32),
            1 => Some(Self::F16),
            _ => None,
        }
    }

    pub fn bytes_per_component(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F16 => 2,
        }
    }

    pub(crate) fn encode_into(self, values: &[f32], out: &mut Vec<u8>) {
        match self {
            Self::F32 => {
                for value in values {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            Self::F16 => {
                for value in values {
                    out.extend_from_slice(&f16::from_f32(*value).to_le_bytes());
                }
            }
        }
    }

    pub(crate) fn decode(self, bytes: &[u8]) -> Vec<f32> {
        match self {
            Self::F32 => bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
            Self::F16 => bytes
                .chunks_exact(2)
                .map(|chunk| f16::from_le_bytes([chunk[0], chunk[1]]).to_f32())
                .collect(),
        }
    }
}

impl fmt::Display for StorageDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32 => write!(f, "f32"),
            Self::F16 => write!(f, "f16"),
        }
    }
}

impl FromStr for StorageDtype {
    type Err = IndexError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "f32" | "float32" => Ok(Self::F32),
            "f16" | "float16" => Ok(Self::F16),
            _ => Err(IndexError::InvalidConfig(format!(
                "unknown dtype '{raw}', expected f32 or f16"
            ))),
        }
    }
}

/// Creation parameters of a store. `dim` and `dtype` are fixed for the
/// lifetime of the store; the growth parameters only affect appends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub dim: usize,
    pub dtype: StorageDtype,
    pub initial_capacity: usize,
    pub resize_increment: usize,
    pub strict_finite: bool,
    pub overwrite: bool,
}

impl IndexConfig {
    pub fn new(dim: usize) -> Result<Self, IndexError> {
        let config = Self {
            dim,
            dtype: StorageDtype::F32,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            resize_increment: DEFAULT_RESIZE_INCREMENT,
            strict_finite: true,
            overwrite: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_dtype(mut self, dtype: StorageDtype) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_resize_increment(mut self, resize_increment: usize) -> Self {
        self.resize_increment = resize_increment;
        self
    }

    pub fn with_strict_finite(mut self, strict_finite: bool) -> Self {
        self.strict_finite = strict_finite;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.dim == 0 {
            return Err(IndexError::InvalidConfig("dim must be > 0".to_string()));
        }
        if u32::try_from(self.dim).is_err() {
            return Err(IndexError::InvalidConfig(format!(
                "dim must fit in 32 bits, got {}",
                self.dim
            )));
        }
        let slab_bytes = (self.initial_capacity as u64)
            .checked_mul(self.dim as u64)
            .and_then(|bytes| bytes.checked_mul(self.dtype.bytes_per_component() as u64))
            .and_then(|bytes| bytes.checked_add(HEADER_LEN));
        if slab_bytes.is_none() {
            return Err(IndexError::InvalidConfig(format!(
                "initial_capacity {} with dim {} overflows the addressable file size",
                self.initial_capacity, self.dim
            )));
        }
        Ok(())
    }
}

/// Capacity after making room for `incoming` vectors.
///
/// Returns `capacity` unchanged when the batch fits. Otherwise the store grows
/// by the shortfall or by `resize_increment`, whichever is larger.
pub fn grown_capacity(
    capacity: usize,
    count: usize,
    incoming: usize,
    resize_increment: usize,
) -> usize {
    let space_left = capacity.saturating_sub(count);
    if incoming <= space_left {
        return capacity;
    }
    let shortfall = incoming - space_left;
    capacity.saturating_add(shortfall.max(resize_increment))
}
