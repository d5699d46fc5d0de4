//! Direct positional-write backend.

use crate::error::StorageResult;
use crate::format;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

/// Writes each record straight to the file at an explicitly tracked position.
///
/// There is no user-space buffer, so `flush` has nothing to do; every append
/// is two `write` calls (prefix, then body) issued after a seek.
#[derive(Debug)]
pub struct RandomAccessWriter {
    file: File,
    scratch: Vec<u8>,
    position: u64,
}

impl RandomAccessWriter {
    pub(crate) fn new(file: File) -> Self {
        Self {
            file,
            scratch: Vec::new(),
            position: 0,
        }
    }

    pub(crate) fn write_version(&mut self, version: i32, header: &[u8]) -> StorageResult<()> {
        self.scratch.clear();
        format::encode_header(&mut self.scratch, version, header)?;
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.write_all(&self.scratch)?;
        self.position += self.scratch.len() as u64;
        Ok(())
    }

    pub(crate) fn append(&mut self, record: &[u8]) -> StorageResult<u64> {
        let prefix = format::length_prefix(record.len())?;
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.write_all(&prefix.to_be_bytes())?;
        self.file.write_all(record)?;

        let written = (format::LENGTH_PREFIX_SIZE + record.len()) as u64;
        self.position += written;
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
        self.position
    }
}
