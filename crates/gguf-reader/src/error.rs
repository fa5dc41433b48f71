use serde::Serialize;
use thiserror::Error;

/// Error kind without payload, for matching on what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Io,
    BadMagic,
    UnsupportedVersion,
    Truncated,
    OutOfBounds,
    InvalidValueType,
    InvalidBool,
    InvalidTensorType,
    TooManyDims,
    DepthExceeded,
    Aborted,
}

/// Everything that can end a traversal. All variants are terminal.
#[derive(Error, Debug)]
pub enum GGUFError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GGUF magic {found:02X?} at offset {offset}")]
    BadMagic { found: [u8; 4], offset: u64 },

    #[error("Unsupported GGUF version {version} at offset {offset}")]
    UnsupportedVersion { version: u32, offset: u64 },

    #[error("Truncated input: {needed} bytes needed at offset {offset}")]
    Truncated { offset: u64, needed: u64 },

    #[error("Read of {len} bytes at offset {offset} exceeds source size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("Invalid value type tag {tag} at offset {offset}")]
    InvalidValueType { tag: u32, offset: u64 },

    #[error("Invalid bool byte {byte} at offset {offset}")]
    InvalidBool { byte: u8, offset: u64 },

    #[error("Invalid tensor type tag {tag} at offset {offset}")]
    InvalidTensorType { tag: u32, offset: u64 },

    #[error("Tensor has {n_dims} dimensions, limit is {max} (offset {offset})")]
    TooManyDims { n_dims: u32, max: u32, offset: u64 },

    #[error("Array nesting deeper than {max} levels at offset {offset}")]
    DepthExceeded { max: usize, offset: u64 },

    #[error("Traversal aborted by visitor at offset {offset}")]
    Aborted { offset: u64 },
}

impl GGUFError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::BadMagic { .. } => ErrorKind::BadMagic,
            Self::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            Self::Truncated { .. } => ErrorKind::Truncated,
            Self::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Self::InvalidValueType { .. } => ErrorKind::InvalidValueType,
            Self::InvalidBool { .. } => ErrorKind::InvalidBool,
            Self::InvalidTensorType { .. } => ErrorKind::InvalidTensorType,
            Self::TooManyDims { .. } => ErrorKind::TooManyDims,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::Aborted { .. } => ErrorKind::Aborted,
        }
    }

    /// Byte offset at which decoding failed. `None` only for I/O errors.
    pub fn offset(&self) -> Option<u64> {
        match *self {
            Self::Io(_) => None,
            Self::BadMagic { offset, .. }
            | Self::UnsupportedVersion { offset, .. }
            | Self::Truncated { offset, .. }
            | Self::OutOfBounds { offset, .. }
            | Self::InvalidValueType { offset, .. }
            | Self::InvalidBool { offset, .. }
            | Self::InvalidTensorType { offset, .. }
            | Self::TooManyDims { offset, .. }
            | Self::DepthExceeded { offset, .. }
            | Self::Aborted { offset } => Some(offset),
        }
    }
}

pub type Result<T> = std::result::Result<T, GGUFError>;
