//! Whole-record channel backend, optionally forcing every write to disk.

use crate::error::StorageResult;
use crate::format;
use std::fs::File;
use std::io::Write;

/// Serializes each record (prefix and body) into a reusable buffer and hands
/// it to the OS in a single `write_all`.
///
/// With `sync_every_write` set, every append is followed by `sync_data`, so a
/// record is durable by the time `append` returns.
#[derive(Debug)]
pub struct FileChannelWriter {
    file: File,
    buffer: Vec<u8>,
    size: u64,
    sync_every_write: bool,
}

impl FileChannelWriter {
    pub(crate) fn new(file: File, sync_every_write: bool) -> Self {
        Self {
            file,
            buffer: Vec::new(),
            size: 0,
            sync_every_write,
        }
    }

    pub(crate) fn sync_every_write(&self) -> bool {
        self.sync_every_write
    }

    pub(crate) fn write_version(&mut self, version: i32, header: &[u8]) -> StorageResult<()> {
        self.buffer.clear();
        format::encode_header(&mut self.buffer, version, header)?;
        self.file.write_all(&self.buffer)?;
        self.size += self.buffer.len() as u64;
        Ok(())
    }

    pub(crate) fn append(&mut self, record: &[u8]) -> StorageResult<u64> {
        self.buffer.clear();
        format::encode_record(&mut self.buffer, record)?;
        self.file.write_all(&self.buffer)?;
        if self.sync_every_write {
            self.file.sync_data()?;
        }

        let written = self.buffer.len() as u64;
        self.size += written;
        Ok(written)
    }

    pub(crate) fn flush(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        Ok(())
    }

    pub(crate) fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }
}
