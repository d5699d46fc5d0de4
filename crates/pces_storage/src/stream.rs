//! Buffered output-stream backend.

use crate::error::StorageResult;
use crate::format;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Capacity of the user-space write buffer.
const BUFFER_SIZE: usize = 64 * 1024;

/// Writes through a [`BufWriter`]; records reach the OS on `flush`.
///
/// This is the default backend. It issues the fewest syscalls on the write
/// path, at the cost of keeping up to [`BUFFER_SIZE`] bytes in process
/// memory until the next flush or sync.
#[derive(Debug)]
pub struct OutputStreamWriter {
    out: BufWriter<File>,
    scratch: Vec<u8>,
    size: u64,
}

impl OutputStreamWriter {
    pub(crate) fn new(file: File) -> Self {
        Self {
            out: BufWriter::with_capacity(BUFFER_SIZE, file),
            scratch: Vec::new(),
            size: 0,
        }
    }

    pub(crate) fn write_version(&mut self, version: i32, header: &[u8]) -> StorageResult<()> {
        self.scratch.clear();
        format::encode_header(&mut self.scratch, version, header)?;
        self.out.write_all(&self.scratch)?;
        self.size += self.scratch.len() as u64;
        Ok(())
    }

    pub(crate) fn append(&mut self, record: &[u8]) -> StorageResult<u64> {
        let prefix = format::length_prefix(record.len())?;
        self.out.write_all(&prefix.to_be_bytes())?;
        self.out.write_all(record)?;

        let written = (format::LENGTH_PREFIX_SIZE + record.len()) as u64;
        self.size += written;
        Ok(written)
    }

    pub(crate) fn flush(&mut self) -> StorageResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub(crate) fn sync(&mut self) -> StorageResult<()> {
        self.out.flush()?;
        self.out.get_ref().sync_data()?;
        Ok(())
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }
}
