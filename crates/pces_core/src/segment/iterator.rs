//! Event iteration over one segment or a run of segments.
//!
//! Both iterators stream: at most one segment is open at a time and records
//! are decoded one by one. A segment that ends in a partial write (a crash
//! mid-append) ends cleanly at its last complete event.

use crate::error::CoreResult;
use crate::segment::SegmentDescriptor;
use crate::types::Event;
use pces_storage::SegmentReader;
use std::collections::VecDeque;
use tracing::warn;

/// Lower bound that admits every event.
pub const NO_LOWER_BOUND: i64 = -1;

/// Events of one segment with indicator `>= lower_bound`, in write order.
#[derive(Debug)]
pub struct SegmentEventIterator {
    descriptor: SegmentDescriptor,
    reader: SegmentReader,
    lower_bound: i64,
    finished: bool,
}

impl SegmentEventIterator {
    /// Opens the segment file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or has an unsupported
    /// format version.
    pub fn open(descriptor: SegmentDescriptor, lower_bound: i64) -> CoreResult<Self> {
        let reader = SegmentReader::open(descriptor.path())?;
        Ok(Self {
            descriptor,
            reader,
            lower_bound,
            finished: false,
        })
    }

    /// Returns the segment being read.
    #[must_use]
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Returns `true` if the segment ended in a partial write.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.reader.is_truncated()
    }

    fn read_next(&mut self) -> CoreResult<Option<Event>> {
        while let Some(record) = self.reader.next_record()? {
            let event = Event::decode(record)?;
            if event.ancient_indicator() >= self.lower_bound {
                return Ok(Some(event));
            }
        }

        if self.reader.is_truncated() {
            warn!(
                segment = %self.descriptor,
                valid_len = self.reader.valid_len(),
                "segment ends in a partial event; stopping at the last complete event"
            );
        }
        Ok(None)
    }
}

impl Iterator for SegmentEventIterator {
    type Item = CoreResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Events across a run of segments, oldest segment first.
///
/// Segments whose upper bound is below the lower bound are skipped without
/// being opened.
#[derive(Debug)]
pub struct PcesEventIterator {
    segments: VecDeque<SegmentDescriptor>,
    lower_bound: i64,
    current: Option<SegmentEventIterator>,
    truncated_segments: usize,
    finished: bool,
}

impl PcesEventIterator {
    /// Creates an iterator over `segments`, which must be oldest first.
    #[must_use]
    pub fn new(segments: VecDeque<SegmentDescriptor>, lower_bound: i64) -> Self {
        Self {
            segments,
            lower_bound,
            current: None,
            truncated_segments: 0,
            finished: false,
        }
    }

    /// Returns the number of segments read so far that ended in a partial write.
    #[must_use]
    pub fn truncated_segments(&self) -> usize {
        self.truncated_segments
    }

    fn read_next(&mut self) -> CoreResult<Option<Event>> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(result) => return result.map(Some),
                    None => {
                        if current.is_truncated() {
                            self.truncated_segments += 1;
                        }
                        self.current = None;
                    }
                }
            }

            let Some(next) = self.segments.pop_front() else {
                return Ok(None);
            };
            if next.upper_bound() < self.lower_bound {
                continue;
            }
            self.current = Some(SegmentEventIterator::open(next, self.lower_bound)?);
        }
    }
}

impl Iterator for PcesEventIterator {
    type Item = CoreResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
