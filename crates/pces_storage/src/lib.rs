//! # PCES Storage
//!
//! Segment file format and writer backends for the preconsensus event stream.
//!
//! A segment is a flat file: an 8-byte header (`i32` format version, `i32`
//! header payload length, both big-endian) followed by length-prefixed
//! records. This crate knows nothing about events, rounds or file naming;
//! records are opaque byte strings.
//!
//! ## Writer Backends
//!
//! - [`OutputStreamWriter`] - buffered stream, the default
//! - [`RandomAccessWriter`] - positional writes, no user-space buffer
//! - [`FileChannelWriter`] - one write per record, optionally synced
//!
//! All backends produce byte-identical files. [`SegmentWriter`] selects one
//! by [`WriterKind`].
//!
//! ## Example
//!
//! ```rust
//! use pces_storage::{SegmentReader, SegmentWriter, WriterKind, FORMAT_VERSION};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("example.pces");
//!
//! let mut writer = SegmentWriter::create(WriterKind::default(), &path).unwrap();
//! writer.write_version(FORMAT_VERSION, &[]).unwrap();
//! writer.append(b"hello world").unwrap();
//! writer.close().unwrap();
//!
//! let mut reader = SegmentReader::open(&path).unwrap();
//! assert_eq!(reader.next_record().unwrap().unwrap(), &b"hello world"[..]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod error;
mod format;
mod random_access;
mod reader;
mod stream;
mod writer;

pub use channel::FileChannelWriter;
pub use error::{StorageError, StorageResult};
pub use format::{FILE_HEADER_SIZE, FORMAT_VERSION, LENGTH_PREFIX_SIZE};
pub use random_access::RandomAccessWriter;
pub use reader::SegmentReader;
pub use stream::OutputStreamWriter;
pub use writer::{SegmentWriter, WriterKind};
