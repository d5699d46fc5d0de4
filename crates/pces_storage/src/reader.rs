//! Streaming segment reader.
//!
//! Reads records one at a time through a fixed-size buffer, so memory use is
//! bounded by the largest record rather than the file size.
//!
//! # Error Handling
//!
//! - A truncated header or record is treated as the end of the segment,
//!   including a length prefix that runs past the end of the file
//! - A negative length prefix returns a corruption error
//! - An unknown format version returns [`StorageError::UnsupportedVersion`]

use crate::error::{StorageError, StorageResult};
use crate::format::{FILE_HEADER_SIZE, FORMAT_VERSION, LENGTH_PREFIX_SIZE};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::debug;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Reads the length-prefixed records of one segment file in write order.
#[derive(Debug)]
pub struct SegmentReader {
    input: BufReader<File>,
    header: Bytes,
    file_len: u64,
    /// Offset just past the last complete record.
    valid_len: u64,
    truncated: bool,
    finished: bool,
}

impl SegmentReader {
    /// Opens a segment and validates its header.
    ///
    /// A file too short to hold a header yields a reader with no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, the version is not
    /// supported, or the header length is negative.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = Self {
            input: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            header: Bytes::new(),
            file_len,
            valid_len: 0,
            truncated: false,
            finished: false,
        };

        let mut fixed = [0u8; FILE_HEADER_SIZE];
        if !read_fully(&mut reader.input, &mut fixed)? {
            reader.mark_truncated();
            return Ok(reader);
        }

        let version = i32::from_be_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]);
        if version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let header_len = i32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let header_len = usize::try_from(header_len).map_err(|_| {
            StorageError::Corrupted(format!("negative header length {header_len}"))
        })?;

        if reader.exceeds_remaining(FILE_HEADER_SIZE as u64, header_len) {
            reader.mark_truncated();
            return Ok(reader);
        }

        let mut header = vec![0u8; header_len];
        if !read_fully(&mut reader.input, &mut header)? {
            reader.mark_truncated();
            return Ok(reader);
        }

        reader.header = Bytes::from(header);
        reader.valid_len = (FILE_HEADER_SIZE + header_len) as u64;
        Ok(reader)
    }

    /// Returns the opaque header payload.
    #[must_use]
    pub fn header(&self) -> &Bytes {
        &self.header
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` at the end of the file, including when the final
    /// record was only partially written.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a negative length prefix.
    pub fn next_record(&mut self) -> StorageResult<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        match read_prefix(&mut self.input, &mut prefix)? {
            Prefix::Eof => {
                self.finished = true;
                return Ok(None);
            }
            Prefix::Partial => {
                self.mark_truncated();
                return Ok(None);
            }
            Prefix::Full => {}
        }

        let len = i32::from_be_bytes(prefix);
        let len = usize::try_from(len).map_err(|_| {
            self.finished = true;
            StorageError::Corrupted(format!(
                "negative record length {len} at offset {}",
                self.valid_len
            ))
        })?;

        if self.exceeds_remaining(self.valid_len + LENGTH_PREFIX_SIZE as u64, len) {
            self.mark_truncated();
            return Ok(None);
        }

        let mut body = vec![0u8; len];
        if !read_fully(&mut self.input, &mut body)? {
            self.mark_truncated();
            return Ok(None);
        }

        self.valid_len += (LENGTH_PREFIX_SIZE + len) as u64;
        Ok(Some(Bytes::from(body)))
    }

    /// Returns `true` if reading stopped at a partially written header or record.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns the number of bytes covered by the header and complete records
    /// read so far.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// A length running past the end of the file can only be a partial
    /// write, so nothing is allocated for it.
    fn exceeds_remaining(&self, offset: u64, len: usize) -> bool {
        self.file_len.saturating_sub(offset) < len as u64
    }

    fn mark_truncated(&mut self) {
        debug!(valid_len = self.valid_len, "segment ends in a partial write");
        self.truncated = true;
        self.finished = true;
    }
}

impl Iterator for SegmentReader {
    type Item = StorageResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

enum Prefix {
    Full,
    Partial,
    Eof,
}

fn read_prefix(input: &mut impl Read, buf: &mut [u8]) -> io::Result<Prefix> {
    let filled = fill(input, buf)?;
    Ok(if filled == buf.len() {
        Prefix::Full
    } else if filled == 0 {
        Prefix::Eof
    } else {
        Prefix::Partial
    })
}

/// Returns `false` if EOF was hit before `buf` was filled.
fn read_fully(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    Ok(fill(input, buf)? == buf.len())
}

fn fill(input: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
