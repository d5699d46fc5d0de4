//! Segment files: naming, writing, tracking and reading.
//!
//! - [`SegmentDescriptor`] - identity and bounds of one file, encoded in its name
//! - [`MutableSegment`] - the single open segment, consumed on close
//! - [`SegmentTracker`] - ordered index of every segment on disk
//! - [`PcesEventIterator`] - events across segments, oldest first

mod descriptor;
mod iterator;
mod mutable;
mod scan;
mod tracker;

pub use descriptor::{SegmentDescriptor, SEGMENT_EXTENSION};
pub use iterator::{PcesEventIterator, SegmentEventIterator, NO_LOWER_BOUND};
pub use mutable::{ClosedSegment, MutableSegment};
pub use scan::{read_segments_from_disk, resolve_discontinuities, scan_segments};
pub use tracker::{check_successor, SegmentTracker};

use crate::error::CoreResult;
use std::path::Path;

/// Syncs a directory so that entries created, renamed or removed in it are durable.
#[cfg(unix)]
pub(crate) fn sync_directory(dir: &Path) -> CoreResult<()> {
    std::fs::File::open(dir)?.sync_all()?;
    Ok(())
}

/// NTFS journals metadata updates; there is no directory handle to sync.
#[cfg(not(unix))]
pub(crate) fn sync_directory(_dir: &Path) -> CoreResult<()> {
    Ok(())
}
