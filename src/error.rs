//! Error types for archive reading and writing.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. Failures are
//! always reported through this type; the library never panics on bad input.

use std::io;
use thiserror::Error;

/// Errors produced by [`ZipArchive`](crate::ZipArchive) and
/// [`ZipCreator`](crate::ZipCreator).
#[derive(Debug, Error)]
pub enum ZipError {
    /// The archive could not be opened or is not a ZIP file.
    #[error("cannot open archive: {0}")]
    Open(String),

    /// The handle is closed (failed open or explicitly closed).
    #[error("archive is closed")]
    Closed,

    /// No entry with the given name.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry index past the end of the index.
    #[error("entry index {index} out of range ({count} entries)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Data does not match what the archive claims about it.
    #[error("corrupted data: {0}")]
    Corrupt(String),

    /// CRC-32 of the decoded payload differs from the stored one.
    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },

    /// Size arithmetic would wrap the platform size type.
    #[error("entry size {0} does not fit in memory")]
    Overflow(u64),

    /// Feature not handled by this reader (encryption, unknown method).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A caller-side requirement was not met.
    #[error("{0}")]
    Precondition(String),

    /// Remote source failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Underlying read/write/create error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ZipError {
    /// True for errors that indicate damaged archive contents.
    pub fn is_corruption(&self) -> bool {
        matches!(self, ZipError::Corrupt(_) | ZipError::CrcMismatch { .. })
    }

    /// True when the requested entry does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ZipError::NotFound(_) | ZipError::IndexOutOfRange { .. }
        )
    }
}

impl From<reqwest::Error> for ZipError {
    fn from(err: reqwest::Error) -> Self {
        ZipError::Http(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ZipError>;
