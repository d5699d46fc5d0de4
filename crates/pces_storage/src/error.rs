//! Error types for segment file operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while writing or reading a segment file.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file header names a format version this build cannot read.
    #[error("unsupported segment format version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// The version found in the file header.
        found: i32,
        /// The version this build reads and writes.
        supported: i32,
    },

    /// A record does not fit in the 32-bit length prefix.
    #[error("record of {len} bytes exceeds the maximum record size")]
    RecordTooLarge {
        /// The length of the rejected record.
        len: usize,
    },

    /// The segment file is corrupted.
    #[error("segment file corrupted: {0}")]
    Corrupted(String),
}
