//! The open-for-write segment.

use crate::error::{CoreError, CoreResult};
use crate::segment::{sync_directory, SegmentDescriptor};
use crate::types::Event;
use pces_storage::{SegmentWriter, WriterKind, FORMAT_VERSION};
use std::fs;
use tracing::debug;

/// A segment that is being written.
///
/// Owns the file handle. Not internally synchronized: a segment has exactly
/// one writer. [`MutableSegment::close`] consumes it and yields a
/// [`ClosedSegment`], whose span can then be compressed.
#[derive(Debug)]
pub struct MutableSegment {
    descriptor: SegmentDescriptor,
    writer: SegmentWriter,
    /// Starts at the lower bound.
    highest_indicator_written: i64,
    scratch: Vec<u8>,
}

impl MutableSegment {
    /// Creates the file for `descriptor` and writes the format header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be created.
    pub fn create(descriptor: SegmentDescriptor, kind: WriterKind) -> CoreResult<Self> {
        if let Some(parent) = descriptor.path().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = SegmentWriter::create(kind, descriptor.path())?;
        writer.write_version(FORMAT_VERSION, &[])?;

        if let Some(parent) = descriptor.path().parent() {
            sync_directory(parent)?;
        }

        debug!(segment = %descriptor, writer = %kind, "opened segment");
        Ok(Self {
            highest_indicator_written: descriptor.lower_bound(),
            descriptor,
            writer,
            scratch: Vec::new(),
        })
    }

    /// Returns the descriptor as created.
    #[must_use]
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Returns `true` if an event with this indicator may be written here.
    #[must_use]
    pub fn can_contain(&self, indicator: i64) -> bool {
        self.descriptor.can_contain(indicator)
    }

    /// Appends an event and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] without writing anything if the
    /// event's indicator is outside the segment bounds, or an I/O error.
    pub fn write_event(&mut self, event: &Event) -> CoreResult<u64> {
        let indicator = event.ancient_indicator();
        if !self.can_contain(indicator) {
            return Err(CoreError::out_of_range(
                indicator,
                self.descriptor.lower_bound(),
                self.descriptor.upper_bound(),
            ));
        }

        self.scratch.clear();
        event.encode(&mut self.scratch);
        let written = self.writer.append(&self.scratch)?;

        self.highest_indicator_written = self.highest_indicator_written.max(indicator);
        Ok(written)
    }

    /// Pushes buffered bytes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Forces written bytes to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.writer.sync()?;
        Ok(())
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.writer.size()
    }

    /// Returns the highest indicator written, or the lower bound if empty.
    #[must_use]
    pub fn highest_indicator_written(&self) -> i64 {
        self.highest_indicator_written
    }

    /// Returns how much of the span was used.
    #[must_use]
    pub fn utilized_span(&self) -> i64 {
        self.highest_indicator_written - self.descriptor.lower_bound()
    }

    /// Returns how much of the span was left unused. Lower is better.
    #[must_use]
    pub fn unutilized_span(&self) -> i64 {
        self.descriptor.upper_bound() - self.highest_indicator_written
    }

    /// Returns the span the segment may legally hold.
    #[must_use]
    pub fn span(&self) -> i64 {
        self.descriptor.span()
    }

    /// Syncs and closes the file, releasing the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(self) -> CoreResult<ClosedSegment> {
        self.writer.close()?;
        Ok(ClosedSegment {
            descriptor: self.descriptor,
            highest_indicator_written: self.highest_indicator_written,
        })
    }
}

/// A segment whose file handle has been released.
#[derive(Debug, Clone)]
pub struct ClosedSegment {
    descriptor: SegmentDescriptor,
    highest_indicator_written: i64,
}

impl ClosedSegment {
    /// Returns the descriptor as created.
    #[must_use]
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Returns the highest indicator written.
    #[must_use]
    pub fn highest_indicator_written(&self) -> i64 {
        self.highest_indicator_written
    }

    /// Returns how much of the span was left unused.
    #[must_use]
    pub fn unutilized_span(&self) -> i64 {
        self.descriptor.upper_bound() - self.highest_indicator_written
    }

    /// Shrinks the upper bound to what was actually used, renaming the file.
    ///
    /// The new upper bound is `max(highest_indicator_written,
    /// previous_upper_bound)`, so it never drops below the previous segment's.
    /// If the whole span was used, the descriptor is returned unchanged and
    /// the file is not touched. The rename is a single `fs::rename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub fn compress_span(self, previous_upper_bound: i64) -> CoreResult<SegmentDescriptor> {
        if self.highest_indicator_written == self.descriptor.upper_bound() {
            return Ok(self.descriptor);
        }

        let upper_bound = self
            .highest_indicator_written
            .max(previous_upper_bound)
            .min(self.descriptor.upper_bound());
        if upper_bound == self.descriptor.upper_bound() {
            return Ok(self.descriptor);
        }

        let compressed = self.descriptor.with_compressed_upper_bound(upper_bound)?;
        fs::rename(self.descriptor.path(), compressed.path())?;
        if let Some(parent) = compressed.path().parent() {
            sync_directory(parent)?;
        }

        debug!(
            from = self.descriptor.upper_bound(),
            to = upper_bound,
            sequence = compressed.sequence(),
            "compressed segment span"
        );
        Ok(compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;
    use bytes::Bytes;
    use chrono::{DateTime, Utc};
    use std::path::Path;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap()
    }

    fn event(round: i64) -> Event {
        Event::new(round, NodeId(0), 1, Bytes::from_static(b"payload"))
    }

    fn open(root: &Path, lower: i64, upper: i64) -> MutableSegment {
        let desc = SegmentDescriptor::new(root, now(), 0, lower, upper, 0).unwrap();
        MutableSegment::create(desc, WriterKind::OutputStream).unwrap()
    }

    #[test]
    fn write_tracks_highest_indicator() {
        let dir = tempdir().unwrap();
        let mut segment = open(dir.path(), 10, 50);
        assert_eq!(segment.highest_indicator_written(), 10);

        segment.write_event(&event(30)).unwrap();
        segment.write_event(&event(20)).unwrap();

        assert_eq!(segment.highest_indicator_written(), 30);
        assert_eq!(segment.utilized_span(), 20);
        assert_eq!(segment.unutilized_span(), 20);
        assert_eq!(segment.span(), 40);
    }

    #[test]
    fn out_of_range_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut segment = open(dir.path(), 0, 100);
        let size = segment.size();

        let result = segment.write_event(&event(150));

        assert!(matches!(
            result,
            Err(CoreError::OutOfRange { indicator: 150, lower_bound: 0, upper_bound: 100 })
        ));
        assert_eq!(segment.size(), size);
        assert_eq!(segment.highest_indicator_written(), 0);
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let desc = SegmentDescriptor::new(dir.path(), now(), 0, 0, 1, 0).unwrap();
        let first = MutableSegment::create(desc.clone(), WriterKind::OutputStream).unwrap();

        assert!(MutableSegment::create(desc, WriterKind::OutputStream).is_err());
        drop(first);
    }

    #[test]
    fn compress_is_noop_when_span_fully_used() {
        let dir = tempdir().unwrap();
        let mut segment = open(dir.path(), 0, 20);
        segment.write_event(&event(5)).unwrap();
        segment.write_event(&event(20)).unwrap();
        let original = segment.descriptor().clone();

        let compressed = segment.close().unwrap().compress_span(0).unwrap();

        assert_eq!(compressed, original);
        assert!(original.path().exists());
    }

    #[test]
    fn compress_renames_to_highest_written() {
        let dir = tempdir().unwrap();
        let mut segment = open(dir.path(), 0, 100);
        segment.write_event(&event(42)).unwrap();
        let original = segment.descriptor().clone();

        let compressed = segment.close().unwrap().compress_span(10).unwrap();

        assert_eq!(compressed.upper_bound(), 42);
        assert!(!original.path().exists());
        assert!(compressed.path().exists());
    }

    #[test]
    fn compress_never_drops_below_previous_upper_bound() {
        let dir = tempdir().unwrap();
        let mut segment = open(dir.path(), 0, 100);
        segment.write_event(&event(42)).unwrap();

        let compressed = segment.close().unwrap().compress_span(60).unwrap();

        assert_eq!(compressed.upper_bound(), 60);
        assert!(compressed.upper_bound() >= 42);
    }
}
