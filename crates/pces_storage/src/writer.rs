//! Segment writer selection and dispatch.

use crate::channel::FileChannelWriter;
use crate::error::{StorageError, StorageResult};
use crate::random_access::RandomAccessWriter;
use crate::stream::OutputStreamWriter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::str::FromStr;

/// The strategy used to push segment bytes to the operating system.
///
/// The choice is purely a performance and platform knob: every kind produces
/// byte-identical files for the same sequence of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    /// Buffered output stream ([`OutputStreamWriter`]).
    #[default]
    OutputStream,
    /// Unbuffered positional writes ([`RandomAccessWriter`]).
    RandomAccess,
    /// One `write` per record ([`FileChannelWriter`]).
    FileChannel,
    /// One `write` per record followed by `sync_data`.
    FileChannelSync,
}

impl WriterKind {
    /// All writer kinds, in declaration order.
    pub const ALL: [WriterKind; 4] = [
        WriterKind::OutputStream,
        WriterKind::RandomAccess,
        WriterKind::FileChannel,
        WriterKind::FileChannelSync,
    ];

    /// Returns the configuration name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            WriterKind::OutputStream => "output_stream",
            WriterKind::RandomAccess => "random_access",
            WriterKind::FileChannel => "file_channel",
            WriterKind::FileChannelSync => "file_channel_sync",
        }
    }
}

impl fmt::Display for WriterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WriterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WriterKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown writer kind: {s}"))
    }
}

/// An open, append-only segment file.
///
/// Dispatches to one of a closed set of backends. The writer owns the file
/// handle; [`SegmentWriter::close`] consumes it, so a closed writer cannot be
/// written to.
#[derive(Debug)]
pub enum SegmentWriter {
    /// Buffered stream backend.
    OutputStream(OutputStreamWriter),
    /// Positional-write backend.
    RandomAccess(RandomAccessWriter),
    /// Whole-record backend, with or without per-write sync.
    FileChannel(FileChannelWriter),
}

impl SegmentWriter {
    /// Creates a new segment file at `path`.
    ///
    /// The parent directory must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be created.
    pub fn create(kind: WriterKind, path: &Path) -> StorageResult<Self> {
        let file = create_new(path)?;
        Ok(match kind {
            WriterKind::OutputStream => Self::OutputStream(OutputStreamWriter::new(file)),
            WriterKind::RandomAccess => Self::RandomAccess(RandomAccessWriter::new(file)),
            WriterKind::FileChannel => Self::FileChannel(FileChannelWriter::new(file, false)),
            WriterKind::FileChannelSync => Self::FileChannel(FileChannelWriter::new(file, true)),
        })
    }

    /// Returns the kind this writer was created with.
    #[must_use]
    pub fn kind(&self) -> WriterKind {
        match self {
            Self::OutputStream(_) => WriterKind::OutputStream,
            Self::RandomAccess(_) => WriterKind::RandomAccess,
            Self::FileChannel(w) if w.sync_every_write() => WriterKind::FileChannelSync,
            Self::FileChannel(_) => WriterKind::FileChannel,
        }
    }

    /// Writes the file header. Must be the first call on a new writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn write_version(&mut self, version: i32, header: &[u8]) -> StorageResult<()> {
        match self {
            Self::OutputStream(w) => w.write_version(version, header),
            Self::RandomAccess(w) => w.write_version(version, header),
            Self::FileChannel(w) => w.write_version(version, header),
        }
    }

    /// Appends one length-prefixed record and returns the number of bytes
    /// written, prefix included.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RecordTooLarge`] if the record does not fit a
    /// 32-bit prefix, or an I/O error.
    pub fn append(&mut self, record: &[u8]) -> StorageResult<u64> {
        match self {
            Self::OutputStream(w) => w.append(record),
            Self::RandomAccess(w) => w.append(record),
            Self::FileChannel(w) => w.append(record),
        }
    }

    /// Pushes buffered bytes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> StorageResult<()> {
        match self {
            Self::OutputStream(w) => w.flush(),
            Self::RandomAccess(w) => w.flush(),
            Self::FileChannel(w) => w.flush(),
        }
    }

    /// Flushes and forces all written bytes to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> StorageResult<()> {
        match self {
            Self::OutputStream(w) => w.sync(),
            Self::RandomAccess(w) => w.sync(),
            Self::FileChannel(w) => w.sync(),
        }
    }

    /// Returns the number of bytes written so far, header included.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::OutputStream(w) => w.size(),
            Self::RandomAccess(w) => w.size(),
            Self::FileChannel(w) => w.size(),
        }
    }

    /// Syncs and closes the file. The handle is released when this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails; the handle is dropped either way.
    pub fn close(mut self) -> StorageResult<()> {
        self.sync()
    }
}

fn create_new(path: &Path) -> StorageResult<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                StorageError::Corrupted(format!("segment file {} already exists", path.display()))
            } else {
                StorageError::Io(e)
            }
        })
}
