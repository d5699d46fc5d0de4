//! Ordered index of the segments on disk.

use crate::error::{CoreError, CoreResult};
use crate::segment::{PcesEventIterator, SegmentDescriptor};
use std::collections::VecDeque;
use tracing::warn;

/// Segments on disk, oldest first.
///
/// Only the segment manager mutates a tracker. Consecutive entries always
/// satisfy [`check_successor`].
#[derive(Debug, Clone, Default)]
pub struct SegmentTracker {
    segments: VecDeque<SegmentDescriptor>,
}

impl SegmentTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment after checking it against the current last one.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the segment does not follow the last one.
    pub fn push(&mut self, descriptor: SegmentDescriptor, permit_gaps: bool) -> CoreResult<()> {
        if let Some(last) = self.segments.back() {
            check_successor(last, &descriptor, permit_gaps)?;
        }
        self.segments.push_back(descriptor);
        Ok(())
    }

    /// Removes and returns the oldest segment.
    pub fn remove_first(&mut self) -> Option<SegmentDescriptor> {
        self.segments.pop_front()
    }

    /// Removes and returns the youngest segment.
    pub fn remove_last(&mut self) -> Option<SegmentDescriptor> {
        self.segments.pop_back()
    }

    /// Replaces the youngest segment, typically after its span was compressed.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if the tracker is empty or the
    /// replacement has a different sequence number.
    pub fn replace_last(&mut self, descriptor: SegmentDescriptor) -> CoreResult<()> {
        let index = self
            .segments
            .len()
            .checked_sub(1)
            .ok_or_else(|| CoreError::invalid_state("no segment to replace"))?;
        self.replace(index, descriptor)
    }

    /// Replaces the segment at `index`.
    ///
    /// The replacement must keep the sequence number and still fit between
    /// its neighbours.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if `index` is out of range or the
    /// sequence differs, and a corruption error if the neighbours reject it.
    pub fn replace(&mut self, index: usize, descriptor: SegmentDescriptor) -> CoreResult<()> {
        let current = self.segments.get(index).ok_or_else(|| {
            CoreError::invalid_state(format!(
                "no segment at index {index} (tracking {})",
                self.segments.len()
            ))
        })?;
        if current.sequence() != descriptor.sequence() {
            return Err(CoreError::invalid_state(format!(
                "replacement sequence {} does not match segment {}",
                descriptor.sequence(),
                current.sequence()
            )));
        }
        if let Some(previous) = index.checked_sub(1).and_then(|i| self.segments.get(i)) {
            check_successor(previous, &descriptor, true)?;
        }
        if let Some(next) = self.segments.get(index + 1) {
            check_successor(&descriptor, next, true)?;
        }
        self.segments[index] = descriptor;
        Ok(())
    }

    /// Returns the index of the oldest segment that can contain `indicator`.
    #[must_use]
    pub fn index_of(&self, indicator: i64) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| segment.can_contain(indicator))
    }

    /// Returns the oldest segment.
    #[must_use]
    pub fn first(&self) -> Option<&SegmentDescriptor> {
        self.segments.front()
    }

    /// Returns the youngest segment.
    #[must_use]
    pub fn last(&self) -> Option<&SegmentDescriptor> {
        self.segments.back()
    }

    /// Returns the segment at `index`, oldest first.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SegmentDescriptor> {
        self.segments.get(index)
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if no segments are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterates segments oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SegmentDescriptor> {
        self.segments.iter()
    }

    /// Sums the on-disk sizes of all segments.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment file is missing.
    pub fn total_size_bytes(&self) -> CoreResult<u64> {
        let mut total = 0;
        for segment in &self.segments {
            total += std::fs::metadata(segment.path())?.len();
        }
        Ok(total)
    }

    /// Returns the index of the first segment to read when starting from
    /// `starting_round`: the first segment of the largest origin that does
    /// not exceed it.
    ///
    /// Returns 0 when the tracker is empty or every origin is newer.
    #[must_use]
    pub fn first_relevant_index(&self, starting_round: i64) -> usize {
        let Some(first) = self.segments.front() else {
            return 0;
        };

        let mut candidate_index = 0;
        let mut candidate_origin = first.origin();
        for (index, segment) in self.segments.iter().enumerate().skip(1) {
            if segment.origin() > starting_round {
                break;
            }
            if segment.origin() != candidate_origin {
                candidate_index = index;
                candidate_origin = segment.origin();
            }
        }
        candidate_index
    }

    /// Returns the origin the stream continues with after starting from
    /// `starting_round`.
    #[must_use]
    pub fn initial_origin(&self, starting_round: i64) -> i64 {
        self.get(self.first_relevant_index(starting_round))
            .map_or(starting_round, SegmentDescriptor::origin)
    }

    /// Returns the segments to read when starting from `starting_round`.
    ///
    /// Reading begins at [`first_relevant_index`](Self::first_relevant_index)
    /// and stops before the first segment of a newer origin, since those were
    /// written after a discontinuity the starting state never saw.
    #[must_use]
    pub fn relevant_segments(&self, starting_round: i64) -> VecDeque<SegmentDescriptor> {
        let start = self.first_relevant_index(starting_round);
        let Some(origin) = self.get(start).map(SegmentDescriptor::origin) else {
            return VecDeque::new();
        };
        self.segments
            .iter()
            .skip(start)
            .take_while(|segment| segment.origin() <= origin)
            .cloned()
            .collect()
    }

    /// Returns an iterator over events with indicator `>= lower_bound`, from
    /// the segments relevant to `starting_round`.
    #[must_use]
    pub fn event_iterator(&self, lower_bound: i64, starting_round: i64) -> PcesEventIterator {
        PcesEventIterator::new(self.relevant_segments(starting_round), lower_bound)
    }
}

/// Checks that `next` may directly follow `previous` in a stream.
///
/// Sequence numbers must increase by exactly one (by at least one when
/// `permit_gaps` is set), and bounds, origin and timestamp must not decrease.
///
/// # Errors
///
/// Returns a corruption error describing the first violated rule.
pub fn check_successor(
    previous: &SegmentDescriptor,
    next: &SegmentDescriptor,
    permit_gaps: bool,
) -> CoreResult<()> {
    if next.sequence() <= previous.sequence() {
        return Err(CoreError::corruption(format!(
            "sequence number {} does not follow {}",
            next.sequence(),
            previous.sequence()
        )));
    }
    if next.sequence() != previous.sequence() + 1 {
        if !permit_gaps {
            return Err(CoreError::corruption(format!(
                "gap in segment sequence: {} follows {}",
                next.sequence(),
                previous.sequence()
            )));
        }
        warn!(
            previous = previous.sequence(),
            next = next.sequence(),
            "gap in segment sequence numbers"
        );
    }
    if next.lower_bound() < previous.lower_bound() {
        return Err(CoreError::corruption(format!(
            "lower bound decreased from {} to {} at sequence {}",
            previous.lower_bound(),
            next.lower_bound(),
            next.sequence()
        )));
    }
    if next.upper_bound() < previous.upper_bound() {
        return Err(CoreError::corruption(format!(
            "upper bound decreased from {} to {} at sequence {}",
            previous.upper_bound(),
            next.upper_bound(),
            next.sequence()
        )));
    }
    if next.origin() < previous.origin() {
        return Err(CoreError::corruption(format!(
            "origin decreased from {} to {} at sequence {}",
            previous.origin(),
            next.origin(),
            next.sequence()
        )));
    }
    if next.timestamp() < previous.timestamp() {
        return Err(CoreError::corruption(format!(
            "timestamp decreased at sequence {}",
            next.sequence()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use std::path::Path;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200 + seconds, 0).unwrap()
    }

    fn desc(sequence: u64, lower: i64, upper: i64, origin: i64) -> SegmentDescriptor {
        SegmentDescriptor::new(Path::new("/s"), at(sequence as i64), sequence, lower, upper, origin)
            .unwrap()
    }

    fn tracker(segments: &[SegmentDescriptor]) -> SegmentTracker {
        let mut tracker = SegmentTracker::new();
        for segment in segments {
            tracker.push(segment.clone(), false).unwrap();
        }
        tracker
    }

    #[test]
    fn push_and_remove() {
        let mut tracker = tracker(&[desc(0, 0, 10, 0), desc(1, 5, 20, 0)]);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.first().unwrap().sequence(), 0);
        assert_eq!(tracker.last().unwrap().sequence(), 1);

        assert_eq!(tracker.remove_first().unwrap().sequence(), 0);
        assert_eq!(tracker.first().unwrap().sequence(), 1);
        assert_eq!(tracker.remove_last().unwrap().sequence(), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn push_rejects_gap_unless_permitted() {
        let mut tracker = tracker(&[desc(0, 0, 10, 0)]);
        assert!(matches!(
            tracker.push(desc(2, 0, 10, 0), false),
            Err(CoreError::Corruption { .. })
        ));
        tracker.push(desc(2, 0, 10, 0), true).unwrap();
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn successor_rules() {
        let base = desc(3, 10, 20, 5);
        check_successor(&base, &desc(4, 10, 20, 5), false).unwrap();

        assert!(check_successor(&base, &desc(3, 10, 20, 5), true).is_err());
        assert!(check_successor(&base, &desc(4, 9, 20, 5), false).is_err());
        assert!(check_successor(&base, &desc(4, 10, 19, 5), false).is_err());
        assert!(check_successor(&base, &desc(4, 10, 20, 4), false).is_err());

        let earlier = SegmentDescriptor::new(Path::new("/s"), at(3) - Duration::seconds(1), 4, 10, 20, 5)
            .unwrap();
        assert!(check_successor(&base, &earlier, false).is_err());
    }

    #[test]
    fn replace_last_requires_same_sequence() {
        let mut tracker = tracker(&[desc(0, 0, 100, 0)]);
        let compressed = tracker.last().unwrap().with_compressed_upper_bound(40).unwrap();
        tracker.replace_last(compressed).unwrap();
        assert_eq!(tracker.last().unwrap().upper_bound(), 40);

        assert!(tracker.replace_last(desc(7, 0, 1, 0)).is_err());
        assert!(SegmentTracker::new().replace_last(desc(0, 0, 1, 0)).is_err());
    }

    #[test]
    fn first_relevant_index_picks_largest_origin_not_after_round() {
        let tracker = tracker(&[
            desc(0, 0, 10, 0),
            desc(1, 0, 10, 0),
            desc(2, 0, 10, 50),
            desc(3, 0, 10, 50),
            desc(4, 0, 10, 90),
        ]);

        assert_eq!(tracker.first_relevant_index(10), 0);
        assert_eq!(tracker.first_relevant_index(50), 2);
        assert_eq!(tracker.first_relevant_index(89), 2);
        assert_eq!(tracker.first_relevant_index(90), 4);
        assert_eq!(tracker.first_relevant_index(1000), 4);
    }

    #[test]
    fn replace_by_index_checks_neighbours() {
        let mut tracker = tracker(&[desc(0, 0, 10, 0), desc(1, 5, 30, 0), desc(2, 5, 40, 0)]);

        tracker.replace(1, desc(1, 5, 20, 0)).unwrap();
        assert_eq!(tracker.get(1).unwrap().upper_bound(), 20);

        assert!(matches!(
            tracker.replace(1, desc(1, 5, 50, 0)),
            Err(CoreError::Corruption { .. })
        ));
        assert!(matches!(
            tracker.replace(1, desc(2, 5, 20, 0)),
            Err(CoreError::InvalidState { .. })
        ));
        assert!(tracker.replace(3, desc(3, 5, 40, 0)).is_err());
        assert_eq!(tracker.get(1).unwrap().upper_bound(), 20);
    }

    #[test]
    fn index_of_finds_oldest_containing_segment() {
        let tracker = tracker(&[desc(0, 0, 10, 0), desc(1, 5, 20, 0), desc(2, 15, 40, 0)]);

        assert_eq!(tracker.index_of(3), Some(0));
        assert_eq!(tracker.index_of(7), Some(0));
        assert_eq!(tracker.index_of(12), Some(1));
        assert_eq!(tracker.index_of(40), Some(2));
        assert_eq!(tracker.index_of(41), None);
        assert_eq!(SegmentTracker::new().index_of(0), None);
    }

    #[test]
    fn relevant_segments_stop_at_newer_origin() {
        let tracker = tracker(&[
            desc(0, 0, 10, 0),
            desc(1, 0, 10, 0),
            desc(2, 0, 10, 50),
            desc(3, 0, 10, 90),
        ]);

        let sequences = |round| -> Vec<u64> {
            tracker
                .relevant_segments(round)
                .iter()
                .map(SegmentDescriptor::sequence)
                .collect()
        };
        assert_eq!(sequences(30), vec![0, 1]);
        assert_eq!(sequences(60), vec![2]);
        assert_eq!(sequences(100), vec![3]);
        assert!(SegmentTracker::new().relevant_segments(5).is_empty());
    }

    #[test]
    fn initial_origin() {
        assert_eq!(SegmentTracker::new().initial_origin(42), 42);

        let tracker = tracker(&[desc(0, 0, 10, 3), desc(1, 0, 10, 8)]);
        assert_eq!(tracker.initial_origin(5), 3);
        assert_eq!(tracker.initial_origin(8), 8);
    }
}
