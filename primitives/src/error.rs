//! Error types shared by the host and the core.

use std::fmt;

/// Status codes returned by core exports (`onesdk_setup`, `onesdk_perform`).
///
/// `0` = OK, non-zero = the core could not honour its side of the ABI.
/// These repr values are part of the ABI and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    BadPointer = 1,
    InvalidEncoding = 2,
    VersionMismatch = 3,
    Internal = 4,
}

impl ErrorCode {
    /// Convert from an i32 status returned by a core export.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::BadPointer),
            2 => Some(Self::InvalidEncoding),
            3 => Some(Self::VersionMismatch),
            4 => Some(Self::Internal),
            _ => None,
        }
    }

    /// Return the i32 representation of this status code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns true if this is the `Ok` variant.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::BadPointer => write!(f, "ERR_BAD_POINTER"),
            Self::InvalidEncoding => write!(f, "ERR_INVALID_ENCODING"),
            Self::VersionMismatch => write!(f, "ERR_VERSION_MISMATCH"),
            Self::Internal => write!(f, "ERR_INTERNAL"),
        }
    }
}

/// Malformed structured-value encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of data at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid type tag {tag:#04x} at offset {offset}")]
    InvalidTag { tag: u8, offset: usize },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("duplicate mapping key {key:?} at offset {offset}")]
    DuplicateKey { key: String, offset: usize },

    #[error("non-finite float at offset {offset}")]
    NonFiniteFloat { offset: usize },

    #[error("unsigned integer at offset {offset} fits the signed encoding")]
    NonCanonicalInteger { offset: usize },

    #[error("{count} trailing bytes after value")]
    TrailingBytes { count: usize },

    #[error("nesting deeper than {} levels", crate::codec::MAX_DEPTH)]
    TooDeep,

    /// The value decoded but does not have the expected message shape.
    #[error("unexpected message shape: {0}")]
    Shape(String),
}
