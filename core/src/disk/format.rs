//! Store file header.
//!
//! Layout (little-endian, padded to [`HEADER_LEN`] bytes):
//!
//! | bytes  | field                                   |
//! |--------|-----------------------------------------|
//! | 0..8   | magic `FFVSTORE`                        |
//! | 8..10  | format version                          |
//! | 10     | dtype tag                               |
//! | 11     | flags (bit 0: strict finite)            |
//! | 12..16 | dim                                     |
//! | 16..24 | capacity (allocated slots)              |
//! | 24..32 | count (`num_vectors`)                   |
//! | 32..40 | committed identifier journal length     |
//! | 40..44 | CRC32 of bytes 0..40                    |
//!
//! The vector slab follows the header; the identifier journal follows the slab.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::{IndexError, StorageDtype};

pub const FORMAT_VERSION: u16 = 1;
pub(crate) const HEADER_LEN: u64 = 64;

const MAGIC: [u8; 8] = *b"FFVSTORE";
const CHECKSUMMED_LEN: usize = 40;
const FLAG_STRICT_FINITE: u8 = 0b0000_0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) format_version: u16,
    pub(crate) dtype: StorageDtype,
    pub(crate) strict_finite: bool,
    pub(crate) dim: u32,
    pub(crate) capacity: u64,
    pub(crate) count: u64,
    pub(crate) journal_len: u64,
}

impl Header {
    pub(crate) fn row_bytes(&self) -> u64 {
        u64::from(self.dim) * self.dtype.bytes_per_component() as u64
    }

    pub(crate) fn row_offset(&self, row: u64) -> u64 {
        HEADER_LEN + row * self.row_bytes()
    }

    pub(crate) fn journal_start(&self) -> u64 {
        self.row_offset(self.capacity)
    }

    pub(crate) fn file_len(&self) -> u64 {
        self.journal_start() + self.journal_len
    }

    /// File length the header describes, or `None` when it does not fit in
    /// `u64`. The unchecked layout helpers are only sound once this succeeds.
    pub(crate) fn checked_file_len(&self) -> Option<u64> {
        self.capacity
            .checked_mul(self.row_bytes())?
            .checked_add(HEADER_LEN)?
            .checked_add(self.journal_len)
    }

    pub(crate) fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut bytes = [0u8; HEADER_LEN as usize];
        bytes[0..8].copy_from_slice(&MAGIC);
        bytes[8..10].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[10] = self.dtype.to_u8();
        bytes[11] = if self.strict_finite {
            FLAG_STRICT_FINITE
        } else {
            0
        };
        bytes[12..16].copy_from_slice(&self.dim.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.capacity.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.count.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.journal_len.to_le_bytes());

        let crc = crc32fast::hash(&bytes[..CHECKSUMMED_LEN]);
        bytes[40..44].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    pub(crate) fn decode(bytes: &[u8; HEADER_LEN as usize]) -> Result<Self, IndexError> {
        if bytes[0..8] != MAGIC {
            return Err(IndexError::CorruptFormat(
                "not a vector store file (bad magic)".to_string(),
            ));
        }

        let stored_crc = u32::from_le_bytes(le_array(&bytes[40..44]));
        let actual_crc = crc32fast::hash(&bytes[..CHECKSUMMED_LEN]);
        if stored_crc != actual_crc {
            return Err(IndexError::CorruptFormat(format!(
                "header checksum mismatch (expected {stored_crc:#010x}, got {actual_crc:#010x})"
            )));
        }

        let format_version = u16::from_le_bytes(le_array(&bytes[8..10]));
        if format_version != FORMAT_VERSION {
            return Err(IndexError::CorruptFormat(format!(
                "unsupported format version {format_version}"
            )));
        }

        let dtype = StorageDtype::from_u8(bytes[10]).ok_or_else(|| {
            IndexError::CorruptFormat(format!("unknown dtype tag {}", bytes[10]))
        })?;

        let header = Self {
            format_version,
            dtype,
            strict_finite: bytes[11] & FLAG_STRICT_FINITE != 0,
            dim: u32::from_le_bytes(le_array(&bytes[12..16])),
            capacity: u64::from_le_bytes(le_array(&bytes[16..24])),
            count: u64::from_le_bytes(le_array(&bytes[24..32])),
            journal_len: u64::from_le_bytes(le_array(&bytes[32..40])),
        };

        if header.dim == 0 {
            return Err(IndexError::CorruptFormat("dim is zero".to_string()));
        }
        if header.count > header.capacity {
            return Err(IndexError::CorruptFormat(format!(
                "count {} exceeds capacity {}",
                header.count, header.capacity
            )));
        }
        if header.checked_file_len().is_none() {
            return Err(IndexError::CorruptFormat(format!(
                "layout of {} slots of dim {} overflows the addressable file size",
                header.capacity, header.dim
            )));
        }
        Ok(header)
    }

    pub(crate) fn read_from(file: &mut File) -> Result<Self, IndexError> {
        let mut bytes = [0u8; HEADER_LEN as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut bytes).map_err(|error| {
            if error.kind() == ErrorKind::UnexpectedEof {
                IndexError::CorruptFormat("file is shorter than the header".to_string())
            } else {
                IndexError::Io(error)
            }
        })?;
        Self::decode(&bytes)
    }

    pub(crate) fn write_to(&self, file: &mut File) -> Result<(), IndexError> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.encode())?;
        Ok(())
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            format_version: FORMAT_VERSION,
            dtype: StorageDtype::F16,
            strict_finite: true,
            dim: 3,
            capacity: 10,
            count: 4,
            journal_len: 77,
        }
    }

    #[test]
    fn header_encodes_and_decodes() {
        let header = sample();
        let decoded = Header::decode(&header.encode()).expect("must decode");
        assert_eq!(decoded, header);
        assert_eq!(decoded.row_bytes(), 6);
        assert_eq!(decoded.journal_start(), HEADER_LEN + 60);
        assert_eq!(decoded.file_len(), HEADER_LEN + 60 + 77);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut bytes = sample().encode();
        bytes[25] ^= 0xff;
        let error = Header::decode(&bytes).expect_err("must fail");
        assert!(matches!(error, IndexError::CorruptFormat(message) if message.contains("checksum")));
    }

    #[test]
    fn rejects_foreign_magic_and_versions() {
        let mut bytes = sample().encode();
        bytes[0] = b'X';
        assert!(matches!(
            Header::decode(&bytes),
            Err(IndexError::CorruptFormat(_))
        ));

        let future = Header {
            format_version: FORMAT_VERSION + 1,
            ..sample()
        };
        let error = Header::decode(&future.encode()).expect_err("must fail");
        assert!(matches!(error, IndexError::CorruptFormat(message) if message.contains("version")));
    }

    #[test]
    fn rejects_count_beyond_capacity() {
        let header = Header {
            count: 11,
            ..sample()
        };
        assert!(Header::decode(&header.encode()).is_err());
    }

    #[test]
    fn rejects_layout_that_overflows_file_size() {
        let header = Header {
            dtype: StorageDtype::F32,
            dim: 4,
            capacity: u64::MAX / 2,
            count: 0,
            journal_len: 0,
            ..sample()
        };
        assert_eq!(header.checked_file_len(), None);
        let error = Header::decode(&header.encode()).expect_err("must fail");
        assert!(matches!(error, IndexError::CorruptFormat(message) if message.contains("overflows")));

        let journal_overflow = Header {
            journal_len: u64::MAX,
            ..sample()
        };
        assert!(matches!(
            Header::decode(&journal_overflow.encode()),
            Err(IndexError::CorruptFormat(_))
        ));
    }
}
