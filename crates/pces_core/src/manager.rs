//! Segment manager: rotation, span sizing, pruning and discontinuities.
//!
//! The manager owns the tracker and at most one open [`MutableSegment`]. It is
//! driven by a single writer and has no internal locking.
//!
//! ## Span sizing
//!
//! When a new segment is opened its upper bound is
//! `non_ancient_boundary + max(desired, minimum)` where
//!
//! ```text
//! basis   = bootstrap || average.is_empty() ? previous_span : average
//! desired = floor(basis * (bootstrap ? bootstrap_factor : span_factor))
//! minimum = (next_indicator + minimum_span) - non_ancient_boundary
//! ```
//!
//! Bootstrap mode ends the first time a segment reaches the preferred size.

use crate::average::RunningAverage;
use crate::clock::{to_chrono, Time};
use crate::config::PcesConfig;
use crate::error::{CoreError, CoreResult};
use crate::metrics::PcesMetrics;
use crate::segment::{
    check_successor, read_segments_from_disk, ClosedSegment, MutableSegment, PcesEventIterator,
    SegmentDescriptor, SegmentTracker,
};
use crate::types::{Event, EventWindow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What to replay at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayRequest {
    /// Events with a lower indicator are skipped.
    pub lower_bound: i64,
    /// Round of the loaded state; selects the origin lineage to read.
    pub starting_round: i64,
}

impl ReplayRequest {
    /// Creates a replay request.
    #[must_use]
    pub const fn new(lower_bound: i64, starting_round: i64) -> Self {
        Self {
            lower_bound,
            starting_round,
        }
    }
}

/// Owns the segments of one stream directory and decides where each event goes.
pub struct SegmentManager {
    config: PcesConfig,
    root: PathBuf,
    time: Arc<dyn Time>,
    metrics: Arc<PcesMetrics>,
    tracker: SegmentTracker,
    current: Option<MutableSegment>,
    non_ancient_boundary: i64,
    minimum_indicator_to_store: i64,
    current_origin: i64,
    bootstrap_mode: bool,
    previous_span: i64,
    average_span_utilization: RunningAverage,
    streaming_new_events: bool,
    total_file_bytes: u64,
}

impl std::fmt::Debug for SegmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentManager")
            .field("root", &self.root)
            .field("segments", &self.tracker.len())
            .field("open", &self.current.as_ref().map(MutableSegment::descriptor))
            .field("non_ancient_boundary", &self.non_ancient_boundary)
            .field("current_origin", &self.current_origin)
            .field("bootstrap_mode", &self.bootstrap_mode)
            .field("streaming_new_events", &self.streaming_new_events)
            .finish_non_exhaustive()
    }
}

impl SegmentManager {
    /// Opens the stream in `root`, rebuilding the tracker from disk.
    ///
    /// Segments from an origin newer than the one relevant to
    /// `starting_round` are deleted. The manager continues with the origin of
    /// the first relevant segment, or `starting_round` if there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the scan fails.
    pub fn open(
        config: PcesConfig,
        root: impl Into<PathBuf>,
        starting_round: i64,
        time: Arc<dyn Time>,
        metrics: Arc<PcesMetrics>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let root = root.into();

        let tracker = read_segments_from_disk(&root, starting_round, config.permit_gaps)?;
        let current_origin = tracker.initial_origin(starting_round);
        let total_file_bytes = tracker.total_size_bytes()?;

        let manager = Self {
            previous_span: config.bootstrap_span,
            average_span_utilization: RunningAverage::new(
                config.span_utilization_running_average_length,
            ),
            config,
            root,
            time,
            metrics,
            tracker,
            current: None,
            non_ancient_boundary: 0,
            minimum_indicator_to_store: 0,
            current_origin,
            bootstrap_mode: true,
            streaming_new_events: false,
            total_file_bytes,
        };
        manager.update_file_metrics();

        info!(
            root = %manager.root.display(),
            segments = manager.tracker.len(),
            origin = current_origin,
            "opened preconsensus event stream"
        );
        Ok(manager)
    }

    /// Returns the stream directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the tracked segments.
    #[must_use]
    pub fn tracker(&self) -> &SegmentTracker {
        &self.tracker
    }

    /// Returns the open segment, if any.
    #[must_use]
    pub fn current_segment(&self) -> Option<&MutableSegment> {
        self.current.as_ref()
    }

    /// Returns the current non-ancient boundary.
    #[must_use]
    pub fn non_ancient_boundary(&self) -> i64 {
        self.non_ancient_boundary
    }

    /// Returns the retention watermark.
    #[must_use]
    pub fn minimum_indicator_to_store(&self) -> i64 {
        self.minimum_indicator_to_store
    }

    /// Returns the origin new segments are created with.
    #[must_use]
    pub fn current_origin(&self) -> i64 {
        self.current_origin
    }

    /// Returns `true` until a segment has reached the preferred size.
    #[must_use]
    pub fn is_bootstrap_mode(&self) -> bool {
        self.bootstrap_mode
    }

    /// Returns `true` once live writing has begun.
    #[must_use]
    pub fn is_streaming_new_events(&self) -> bool {
        self.streaming_new_events
    }

    /// Returns the total size of all tracked segments, as of the last close.
    #[must_use]
    pub fn total_file_bytes(&self) -> u64 {
        self.total_file_bytes
    }

    /// Returns an iterator over the events a replay should deliver.
    #[must_use]
    pub fn event_iterator(&self, request: ReplayRequest) -> PcesEventIterator {
        self.tracker
            .event_iterator(request.lower_bound, request.starting_round)
    }

    /// Ends replay: from now on events are written and pruning is enabled.
    ///
    /// One-way. A second call is logged and otherwise ignored.
    pub fn begin_streaming_new_events(&mut self) {
        if self.streaming_new_events {
            error!("begin_streaming_new_events called while already streaming new events");
        }
        self.streaming_new_events = true;
    }

    /// Records that the stream restarts from a new origin.
    ///
    /// Closes the open segment first. Every segment created afterwards carries
    /// `new_origin`.
    ///
    /// # Errors
    ///
    /// Returns an illegal argument error if `new_origin` is not strictly
    /// greater than the current origin (the open segment is still closed), or
    /// any error from closing the open segment.
    pub fn register_discontinuity(&mut self, new_origin: i64) -> CoreResult<()> {
        if !self.streaming_new_events {
            error!(new_origin, "register_discontinuity called while replaying events");
        }

        let closed = self.close_current_segment();

        if new_origin <= self.current_origin {
            return Err(CoreError::illegal_argument(format!(
                "new origin {new_origin} must be greater than the current origin {}",
                self.current_origin
            )));
        }

        info!(
            last_segment = ?self.tracker.last().map(ToString::to_string),
            previous_origin = self.current_origin,
            new_origin,
            "the preconsensus event stream has a discontinuity; future segments use the new origin"
        );
        self.current_origin = new_origin;
        closed
    }

    /// Advances the non-ancient boundary.
    ///
    /// # Errors
    ///
    /// Returns an illegal argument error if the boundary would decrease.
    pub fn update_non_ancient_event_boundary(&mut self, window: &EventWindow) -> CoreResult<()> {
        let boundary = window.ancient_threshold();
        if boundary < self.non_ancient_boundary {
            return Err(CoreError::illegal_argument(format!(
                "non-ancient boundary cannot decrease: current {}, requested {boundary}",
                self.non_ancient_boundary
            )));
        }
        self.non_ancient_boundary = boundary;
        Ok(())
    }

    /// Sets the retention watermark and prunes immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if a pruned segment cannot be deleted.
    pub fn set_minimum_indicator_to_store(&mut self, minimum: i64) -> CoreResult<()> {
        self.minimum_indicator_to_store = minimum;
        self.prune_old_files(minimum)
    }

    /// Makes sure the open segment can take `event`, rotating if needed.
    ///
    /// The open segment is closed when it cannot contain the event or has
    /// reached the preferred size; the latter also ends bootstrap mode. A new
    /// segment is then opened with a span computed from recent utilization.
    ///
    /// # Errors
    ///
    /// Returns an error if closing or creating a segment fails.
    pub fn prepare_output_stream(&mut self, event: &Event) -> CoreResult<()> {
        let indicator = event.ancient_indicator();

        if let Some(current) = &self.current {
            let can_contain = current.can_contain(indicator);
            let is_full = current.size() as f64 >= self.config.preferred_file_size_bytes();

            if !can_contain || is_full {
                debug!(
                    sequence = current.descriptor().sequence(),
                    indicator,
                    can_contain,
                    is_full,
                    "rotating segment"
                );
                self.close_current_segment()?;
            }
            if is_full {
                self.bootstrap_mode = false;
            }
        }

        if self.current.is_none() {
            let lower_bound = self.non_ancient_boundary;
            let upper_bound = lower_bound.saturating_add(self.compute_new_file_span(lower_bound, indicator));
            let descriptor = self.next_segment_descriptor(lower_bound, upper_bound)?;

            match MutableSegment::create(descriptor, self.config.writer_type) {
                Ok(segment) => {
                    self.metrics.record_file_written();
                    self.current = Some(segment);
                }
                Err(e) => {
                    self.tracker.remove_last();
                    self.update_file_metrics();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Writes an event to the open segment and returns the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if no segment is open, or
    /// [`CoreError::OutOfRange`] if the open segment cannot contain the event.
    pub fn write_event(&mut self, event: &Event) -> CoreResult<u64> {
        self.current
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("no open segment; call prepare_output_stream"))?
            .write_event(event)
    }

    /// Flushes the open segment, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        match self.current.as_mut() {
            Some(segment) => segment.flush(),
            None => Ok(()),
        }
    }

    /// Syncs the open segment, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        match self.current.as_mut() {
            Some(segment) => segment.sync(),
            None => Ok(()),
        }
    }

    /// Closes the open segment, compresses its span and prunes.
    ///
    /// Does nothing if no segment is open.
    ///
    /// # Errors
    ///
    /// Returns an error if closing, renaming or pruning fails.
    pub fn close_current_segment(&mut self) -> CoreResult<()> {
        let Some(segment) = self.current.take() else {
            return Ok(());
        };

        self.previous_span = segment.utilized_span();
        if !self.bootstrap_mode {
            self.average_span_utilization.add(self.previous_span);
        }

        let closed = segment.close()?;
        self.finished_writing(closed)?;

        self.prune_old_files(self.minimum_indicator_to_store)
    }

    /// Describes and starts tracking the next segment. The file is not created.
    ///
    /// Bounds are raised to at least those of the last tracked segment. The
    /// sequence number is one past the last, or 0 for the first segment.
    ///
    /// # Errors
    ///
    /// Returns an illegal argument error if `lower_bound > upper_bound`, or a
    /// corruption error if the result would not follow the last segment.
    pub fn next_segment_descriptor(
        &mut self,
        lower_bound: i64,
        upper_bound: i64,
    ) -> CoreResult<SegmentDescriptor> {
        if lower_bound > upper_bound {
            return Err(CoreError::illegal_argument(format!(
                "lower bound {lower_bound} must not exceed upper bound {upper_bound}"
            )));
        }

        let (lower_bound, upper_bound, sequence) = match self.tracker.last() {
            None => (lower_bound, upper_bound, 0),
            Some(last) => (
                lower_bound.max(last.lower_bound()),
                upper_bound.max(last.upper_bound()),
                last.sequence() + 1,
            ),
        };

        let descriptor = SegmentDescriptor::new(
            &self.root,
            self.time.now(),
            sequence,
            lower_bound,
            upper_bound,
            self.current_origin,
        )?;

        if let Some(last) = self.tracker.last() {
            check_successor(last, &descriptor, false)?;
        }
        self.tracker.push(descriptor.clone(), self.config.permit_gaps)?;
        self.update_file_metrics();

        Ok(descriptor)
    }

    /// Deletes the oldest segments that are both below `lower_bound_to_keep`
    /// and older than the retention period.
    ///
    /// Stops at the first segment that fails either test, and never removes
    /// the open segment. Does nothing before
    /// [`begin_streaming_new_events`](Self::begin_streaming_new_events).
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be deleted.
    pub fn prune_old_files(&mut self, lower_bound_to_keep: i64) -> CoreResult<()> {
        if !self.streaming_new_events {
            return Ok(());
        }

        let retention = to_chrono(self.config.minimum_retention_period());
        let Some(cutoff) = self.time.now().checked_sub_signed(retention) else {
            return Ok(());
        };
        let open_sequence = self
            .current
            .as_ref()
            .map(|segment| segment.descriptor().sequence());

        let mut pruned = 0usize;
        while let Some(oldest) = self.tracker.first() {
            if oldest.upper_bound() >= lower_bound_to_keep
                || oldest.timestamp() > cutoff
                || Some(oldest.sequence()) == open_sequence
            {
                break;
            }
            let Some(oldest) = self.tracker.remove_first() else {
                break;
            };

            let size = match std::fs::metadata(oldest.path()) {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!(segment = %oldest, error = %e, "cannot read size of pruned segment");
                    0
                }
            };
            self.total_file_bytes = self.total_file_bytes.saturating_sub(size);
            oldest.delete_file(&self.root)?;
            pruned += 1;
        }

        if pruned > 0 {
            debug!(pruned, lower_bound_to_keep, "pruned old segments");
        }
        self.update_file_metrics();
        Ok(())
    }

    fn compute_new_file_span(&self, minimum_lower_bound: i64, next_indicator: i64) -> i64 {
        let basis = if self.bootstrap_mode || self.average_span_utilization.is_empty() {
            self.previous_span
        } else {
            self.average_span_utilization.average()
        };

        let factor = if self.bootstrap_mode {
            self.config.bootstrap_span_overlap_factor
        } else {
            self.config.span_overlap_factor
        };

        // Saturating float-to-int cast.
        let desired = (basis as f64 * factor).floor() as i64;
        let minimum = next_indicator
            .saturating_add(self.config.minimum_span)
            .saturating_sub(minimum_lower_bound);

        desired.max(minimum)
    }

    fn finished_writing(&mut self, closed: ClosedSegment) -> CoreResult<()> {
        let previous_upper_bound = match self.tracker.len() {
            0 | 1 => 0,
            n => self.tracker.get(n - 2).map_or(0, SegmentDescriptor::upper_bound),
        };

        let span = closed.descriptor().span();
        self.metrics
            .record_closed_span(span, closed.unutilized_span());

        let descriptor = closed.compress_span(previous_upper_bound)?;
        self.total_file_bytes += std::fs::metadata(descriptor.path())?.len();
        self.tracker.replace_last(descriptor)?;
        self.update_file_metrics();
        Ok(())
    }

    fn update_file_metrics(&self) {
        self.metrics.set_file_count(self.tracker.len() as u64);
        self.metrics.set_total_file_bytes(self.total_file_bytes);

        if let Some(first) = self.tracker.first() {
            self.metrics.set_oldest_lower_bound(first.lower_bound());
            let age = (self.time.now() - first.timestamp()).num_seconds().max(0);
            self.metrics.set_oldest_file_age_seconds(age as u64);
        }
        if let Some(last) = self.tracker.last() {
            self.metrics.set_youngest_upper_bound(last.upper_bound());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeTime;
    use crate::types::NodeId;
    use bytes::Bytes;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        time: Arc<FakeTime>,
        metrics: Arc<PcesMetrics>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
                time: Arc::new(FakeTime::new()),
                metrics: Arc::new(PcesMetrics::new()),
            }
        }

        fn open(&self, config: PcesConfig, starting_round: i64) -> SegmentManager {
            SegmentManager::open(
                config,
                self.dir.path(),
                starting_round,
                self.time.clone(),
                self.metrics.clone(),
            )
            .unwrap()
        }
    }

    fn event(round: i64) -> Event {
        Event::new(round, NodeId(0), 0, Bytes::from(vec![7u8; 100]))
    }

    fn write(manager: &mut SegmentManager, round: i64) {
        let event = event(round);
        manager.prepare_output_stream(&event).unwrap();
        manager.write_event(&event).unwrap();
    }

    #[test]
    fn first_segment_uses_bootstrap_span() {
        let fixture = Fixture::new();
        let mut manager = fixture.open(PcesConfig::default(), 0);
        manager.begin_streaming_new_events();

        write(&mut manager, 3);

        let segment = manager.current_segment().unwrap().descriptor().clone();
        assert_eq!(segment.sequence(), 0);
        assert_eq!(segment.lower_bound(), 0);
        // max(floor(50 * 10.0), 3 + 5 - 0)
        assert_eq!(segment.upper_bound(), 500);
        assert_eq!(manager.tracker().len(), 1);
    }

    #[test]
    fn minimum_span_covers_triggering_event() {
        let fixture = Fixture::new();
        let config = PcesConfig::default().bootstrap_span(1).minimum_span(5);
        let mut manager = fixture.open(config, 0);
        manager.begin_streaming_new_events();

        write(&mut manager, 1_000);

        // max(floor(1 * 10.0), 1000 + 5 - 0)
        assert_eq!(manager.current_segment().unwrap().descriptor().upper_bound(), 1_005);
    }

    #[test]
    fn rotates_when_event_out_of_range() {
        let fixture = Fixture::new();
        let config = PcesConfig::default().bootstrap_span(1).minimum_span(2);
        let mut manager = fixture.open(config, 0);
        manager.begin_streaming_new_events();

        write(&mut manager, 1); // [0, 10]
        write(&mut manager, 30);

        let tracker = manager.tracker();
        assert_eq!(tracker.len(), 2);
        let first = tracker.get(0).unwrap();
        assert_eq!(first.upper_bound(), 1, "span compressed to what was used");
        assert!(tracker.get(1).unwrap().can_contain(30));
        assert!(manager.is_bootstrap_mode());
    }

    #[test]
    fn rotates_when_full_and_leaves_bootstrap() {
        let fixture = Fixture::new();
        // About two events per segment.
        let config = PcesConfig::default().preferred_file_size_megabytes(200.0 / (1024.0 * 1024.0));
        let mut manager = fixture.open(config, 0);
        manager.begin_streaming_new_events();

        write(&mut manager, 1);
        write(&mut manager, 2);
        assert!(manager.is_bootstrap_mode());
        write(&mut manager, 3);

        assert!(!manager.is_bootstrap_mode());
        assert_eq!(manager.tracker().len(), 2);
    }

    #[test]
    fn steady_state_span_uses_average_utilization() {
        let fixture = Fixture::new();
        // Every segment is full after one event.
        let config = PcesConfig::default()
            .preferred_file_size_megabytes(100.0 / (1024.0 * 1024.0))
            .minimum_span(0);
        let mut manager = fixture.open(config, 0);
        manager.begin_streaming_new_events();

        write(&mut manager, 10); // [0, 500], bootstrap
        write(&mut manager, 11); // leaves bootstrap: floor(10 * 1.2) = 12
        write(&mut manager, 12); // average of [12]: floor(12 * 1.2) = 14

        let tracker = manager.tracker();
        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.get(0).unwrap().upper_bound(), 10);
        assert_eq!(tracker.get(1).unwrap().upper_bound(), 12);
        assert_eq!(tracker.get(2).unwrap().upper_bound(), 14);
        assert!(!manager.is_bootstrap_mode());
    }

    #[test]
    fn next_descriptor_clamps_to_previous_bounds() {
        let fixture = Fixture::new();
        let mut manager = fixture.open(PcesConfig::default(), 0);

        let first = manager.next_segment_descriptor(10, 100).unwrap();
        let second = manager.next_segment_descriptor(5, 50).unwrap();

        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);
        assert_eq!(second.lower_bound(), 10);
        assert_eq!(second.upper_bound(), 100);
        assert!(manager.next_segment_descriptor(6, 5).is_err());
    }

    #[test]
    fn write_without_prepare_is_invalid_state() {
        let fixture = Fixture::new();
        let mut manager = fixture.open(PcesConfig::default(), 0);
        assert!(matches!(
            manager.write_event(&event(1)),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn boundary_cannot_decrease() {
        let fixture = Fixture::new();
        let mut manager = fixture.open(PcesConfig::default(), 0);

        manager
            .update_non_ancient_event_boundary(&EventWindow::new(0, 10))
            .unwrap();
        manager
            .update_non_ancient_event_boundary(&EventWindow::new(0, 10))
            .unwrap();
        assert!(matches!(
            manager.update_non_ancient_event_boundary(&EventWindow::new(0, 9)),
            Err(CoreError::IllegalArgument { .. })
        ));
        assert_eq!(manager.non_ancient_boundary(), 10);
    }

    #[test]
    fn discontinuity_requires_greater_origin() {
        let fixture = Fixture::new();
        let mut manager = fixture.open(PcesConfig::default(), 3);
        manager.begin_streaming_new_events();
        assert_eq!(manager.current_origin(), 3);

        write(&mut manager, 1);
        assert!(matches!(
            manager.register_discontinuity(2),
            Err(CoreError::IllegalArgument { .. })
        ));
        assert!(manager.current_segment().is_none(), "open segment closed anyway");

        manager.register_discontinuity(4).unwrap();
        write(&mut manager, 2);
        assert_eq!(manager.tracker().last().unwrap().origin(), 4);
    }

    #[test]
    fn pruning_waits_for_streaming() {
        let fixture = Fixture::new();
        let config = PcesConfig::default()
            .bootstrap_span(1)
            .minimum_span(1)
            .minimum_retention_period_seconds(0);
        let mut manager = fixture.open(config, 0);

        manager.next_segment_descriptor(0, 5).unwrap();
        let desc = manager.tracker().last().unwrap().clone();
        MutableSegment::create(desc, pces_storage::WriterKind::OutputStream)
            .unwrap()
            .close()
            .unwrap();
        fixture.time.tick(Duration::from_secs(1));

        manager.set_minimum_indicator_to_store(100).unwrap();
        assert_eq!(manager.tracker().len(), 1);

        manager.begin_streaming_new_events();
        manager.set_minimum_indicator_to_store(100).unwrap();
        assert!(manager.tracker().is_empty());
    }

    #[test]
    fn reopen_continues_sequence_and_origin() {
        let fixture = Fixture::new();
        {
            let mut manager = fixture.open(PcesConfig::default(), 7);
            manager.begin_streaming_new_events();
            write(&mut manager, 1);
            manager.close_current_segment().unwrap();
        }
        fixture.time.tick(Duration::from_secs(1));

        let mut manager = fixture.open(PcesConfig::default(), 9);
        assert_eq!(manager.current_origin(), 7);
        assert_eq!(manager.tracker().len(), 1);
        manager.begin_streaming_new_events();
        write(&mut manager, 2);
        assert_eq!(manager.tracker().last().unwrap().sequence(), 1);
    }

    #[test]
    fn metrics_follow_tracker() {
        let fixture = Fixture::new();
        let mut manager = fixture.open(PcesConfig::default(), 0);
        manager.begin_streaming_new_events();

        write(&mut manager, 1);
        manager.close_current_segment().unwrap();

        let snap = fixture.metrics.snapshot();
        assert_eq!(snap.file_count, 1);
        assert_eq!(snap.files_written, 1);
        assert_eq!(snap.total_file_bytes, manager.total_file_bytes());
        assert!(snap.total_file_bytes > 0);
        assert_eq!(snap.youngest_upper_bound, 1);
    }

    #[test]
    fn pruning_a_vanished_segment_reports_the_error() {
        let fixture = Fixture::new();
        let config = PcesConfig::default().minimum_retention_period_seconds(0);
        let mut manager = fixture.open(config, 0);
        manager.begin_streaming_new_events();
        write(&mut manager, 1);
        manager.close_current_segment().unwrap();
        let bytes_before = manager.total_file_bytes();

        let segment = manager.tracker().first().unwrap().clone();
        std::fs::remove_file(segment.path()).unwrap();

        assert!(matches!(manager.prune_old_files(10), Err(CoreError::Io(_))));
        assert!(manager.tracker().is_empty());
        assert_eq!(manager.total_file_bytes(), bytes_before);
    }
}
