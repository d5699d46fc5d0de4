//! Byte layout shared by every writer backend and by the reader.
//!
//! ```text
//! | version (4) | header_len (4) | header (N) |      once, at the start of the file
//! | record_len (4) | record (M) |                  repeated until end of file
//! ```
//!
//! All integers are big-endian signed 32-bit values. A record is an opaque
//! serialized event; this crate never looks inside it.

use crate::error::{StorageError, StorageResult};
use bytes::BufMut;

/// The segment format version written by this build.
pub const FORMAT_VERSION: i32 = 1;

/// Size of a length prefix (and of the version field).
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the fixed part of the file header: version + header length.
pub const FILE_HEADER_SIZE: usize = 2 * LENGTH_PREFIX_SIZE;

/// Converts a buffer length to its on-disk prefix.
pub(crate) fn length_prefix(len: usize) -> StorageResult<i32> {
    i32::try_from(len).map_err(|_| StorageError::RecordTooLarge { len })
}

/// Appends the file header to `buf`.
pub(crate) fn encode_header(buf: &mut Vec<u8>, version: i32, payload: &[u8]) -> StorageResult<()> {
    let len = length_prefix(payload.len())?;
    buf.reserve(FILE_HEADER_SIZE + payload.len());
    buf.put_i32(version);
    buf.put_i32(len);
    buf.put_slice(payload);
    Ok(())
}

/// Appends one length-prefixed record to `buf`.
pub(crate) fn encode_record(buf: &mut Vec<u8>, record: &[u8]) -> StorageResult<()> {
    let len = length_prefix(record.len())?;
    buf.reserve(LENGTH_PREFIX_SIZE + record.len());
    buf.put_i32(len);
    buf.put_slice(record);
    Ok(())
}
