//! Rebuilding the segment tracker from disk.

use crate::error::CoreResult;
use crate::segment::{SegmentDescriptor, SegmentTracker, SEGMENT_EXTENSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scans `root` for segment files without modifying anything.
///
/// The walk is recursive. Files without the segment extension are ignored.
/// Segments are ordered by sequence number and checked pairwise. A missing
/// root yields an empty tracker.
///
/// # Errors
///
/// Returns an error if a segment name cannot be parsed, if consecutive
/// segments violate the ordering rules, or on I/O failure.
pub fn scan_segments(root: &Path, permit_gaps: bool) -> CoreResult<SegmentTracker> {
    let mut tracker = SegmentTracker::new();
    if !root.exists() {
        return Ok(tracker);
    }

    let mut paths = Vec::new();
    collect_segment_paths(root, &mut paths)?;

    let mut descriptors = paths
        .iter()
        .map(|path| SegmentDescriptor::parse(path))
        .collect::<CoreResult<Vec<_>>>()?;
    descriptors.sort_by_key(SegmentDescriptor::sequence);

    for descriptor in descriptors {
        tracker.push(descriptor, permit_gaps)?;
    }

    debug!(root = %root.display(), segments = tracker.len(), "scanned segments");
    Ok(tracker)
}

/// Scans `root` and discards segments from lineages the loaded state never saw.
///
/// See [`resolve_discontinuities`].
///
/// # Errors
///
/// Returns an error if the scan fails or a discarded segment cannot be deleted.
pub fn read_segments_from_disk(
    root: &Path,
    starting_round: i64,
    permit_gaps: bool,
) -> CoreResult<SegmentTracker> {
    let tracker = scan_segments(root, permit_gaps)?;
    resolve_discontinuities(root, tracker, starting_round)
}

/// Deletes segments whose origin is newer than the origin relevant to
/// `starting_round`.
///
/// Such segments were written after a discontinuity that the state being
/// loaded predates; replaying them would mix two lineages.
///
/// # Errors
///
/// Returns an error if a segment cannot be deleted.
pub fn resolve_discontinuities(
    root: &Path,
    tracker: SegmentTracker,
    starting_round: i64,
) -> CoreResult<SegmentTracker> {
    let Some(relevant) = tracker.get(tracker.first_relevant_index(starting_round)) else {
        return Ok(tracker);
    };
    let relevant_origin = relevant.origin();

    let mut kept = SegmentTracker::new();
    let mut discarded = 0usize;
    for segment in tracker.iter() {
        if segment.origin() > relevant_origin {
            warn!(
                segment = %segment,
                starting_round,
                relevant_origin,
                "deleting segment from a newer origin than the loaded state"
            );
            segment.delete_file(root)?;
            discarded += 1;
        } else {
            // Already checked pairwise during the scan; gaps were accepted there.
            kept.push(segment.clone(), true)?;
        }
    }

    if discarded > 0 {
        warn!(discarded, relevant_origin, "discarded segments after a discontinuity");
    }
    Ok(kept)
}

fn collect_segment_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> CoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_segment_paths(&path, paths)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(SEGMENT_EXTENSION) {
            paths.push(path);
        }
    }
    Ok(())
}
