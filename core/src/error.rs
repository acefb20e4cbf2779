use std::error::Error;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum IndexError {
    AlreadyExists { path: PathBuf },
    NotFound { path: PathBuf },
    CorruptFormat(String),
    OutOfRange { offset: u64, count: u64 },
    PreconditionViolation(String),
    InvariantViolation(String),
    InvalidConfig(String),
    InvalidDimension { expected: usize, got: usize },
    NonFiniteValue { row: usize, index: usize },
    InvalidBatch(String),
    Io(std::io::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists { path } => {
                write!(f, "index file '{}' already exists", path.display())
            }
            Self::NotFound { path } => write!(f, "index file '{}' not found", path.display()),
            Self::CorruptFormat(message) => write!(f, "corrupt index format: {message}"),
            Self::OutOfRange { offset, count } => {
                write!(f, "offset {offset} out of range for {count} stored vectors")
            }
            Self::PreconditionViolation(message) => {
                write!(f, "precondition violated: {message}")
            }
            Self::InvariantViolation(message) => write!(f, "invariant violated: {message}"),
            Self::InvalidConfig(message) => write!(f, "invalid config: {message}"),
            Self::InvalidDimension { expected, got } => {
                write!(
                    f,
                    "invalid vector dimension: expected {expected}, got {got}"
                )
            }
            Self::NonFiniteValue { row, index } => {
                write!(f, "vector {row} contains non-finite value at index {index}")
            }
            Self::InvalidBatch(message) => write!(f, "invalid batch: {message}"),
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IndexError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}
