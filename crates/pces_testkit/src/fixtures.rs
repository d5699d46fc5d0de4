//! Test fixtures and stream helpers.
//!
//! Provides temporary stream directories, deterministic events and a replay
//! target that records what it receives.

use bytes::Bytes;
use pces_core::segment::scan_segments;
use pces_core::{
    CoreResult, Event, FakeTime, NodeId, PcesConfig, PcesMetrics, ReplayRequest, ReplayTarget,
    SegmentDescriptor, SegmentManager,
};
use pces_storage::{FILE_HEADER_SIZE, LENGTH_PREFIX_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A stream directory with automatic cleanup, a fake clock and shared metrics.
pub struct TestStream {
    temp_dir: TempDir,
    time: Arc<FakeTime>,
    metrics: Arc<PcesMetrics>,
}

impl TestStream {
    /// Creates an empty stream directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            time: Arc::new(FakeTime::new()),
            metrics: Arc::new(PcesMetrics::new()),
        }
    }

    /// Returns the stream directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the clock shared by every manager opened here.
    pub fn time(&self) -> &Arc<FakeTime> {
        &self.time
    }

    /// Returns the metrics shared by every manager opened here.
    pub fn metrics(&self) -> &Arc<PcesMetrics> {
        &self.metrics
    }

    /// Opens a manager over the directory.
    pub fn open(&self, config: PcesConfig, starting_round: i64) -> SegmentManager {
        SegmentManager::open(
            config,
            self.path(),
            starting_round,
            self.time.clone(),
            self.metrics.clone(),
        )
        .expect("Failed to open segment manager")
    }

    /// Opens a manager that has already finished replay.
    pub fn open_streaming(&self, config: PcesConfig, starting_round: i64) -> SegmentManager {
        let mut manager = self.open(config, starting_round);
        manager.begin_streaming_new_events();
        manager
    }

    /// Lists the segments on disk without modifying anything.
    pub fn segments(&self) -> Vec<SegmentDescriptor> {
        scan_segments(self.path(), true)
            .expect("Failed to scan segments")
            .iter()
            .cloned()
            .collect()
    }

    /// Reopens the stream and returns the birth rounds a replay would see.
    pub fn replay_rounds(&self, config: PcesConfig, lower_bound: i64, starting_round: i64) -> Vec<i64> {
        let manager = self.open(config, starting_round);
        manager
            .event_iterator(ReplayRequest::new(lower_bound, starting_round))
            .map(|event| event.expect("Failed to read event").birth_round())
            .collect()
    }
}

impl Default for TestStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `events` through `manager`, rotating as needed.
pub fn write_events(manager: &mut SegmentManager, events: &[Event]) {
    for event in events {
        manager
            .prepare_output_stream(event)
            .expect("Failed to prepare output stream");
        manager.write_event(event).expect("Failed to write event");
    }
}

/// Returns the birth round of each event.
pub fn rounds(events: &[Event]) -> Vec<i64> {
    events.iter().map(Event::birth_round).collect()
}

/// Returns the on-disk size of a segment holding `count` events of
/// `payload_len` bytes each.
pub fn segment_size(count: usize, payload_len: usize) -> u64 {
    let record = LENGTH_PREFIX_SIZE + pces_core::EVENT_HEADER_SIZE + payload_len;
    (FILE_HEADER_SIZE + count * record) as u64
}

/// Returns a config whose segments fill up after `count` events of
/// `payload_len` bytes.
pub fn config_for_events_per_segment(count: usize, payload_len: usize) -> PcesConfig {
    let bytes = segment_size(count, payload_len) as f64;
    PcesConfig::default().preferred_file_size_megabytes(bytes / (1024.0 * 1024.0))
}

/// Generates events deterministically from a seed.
pub struct EventGenerator {
    rng: StdRng,
    creators: u64,
    payload_len: usize,
}

impl EventGenerator {
    /// Payload length used unless overridden.
    pub const DEFAULT_PAYLOAD_LEN: usize = 32;

    /// Creates a generator with four creators and 32-byte payloads.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            creators: 4,
            payload_len: Self::DEFAULT_PAYLOAD_LEN,
        }
    }

    /// Sets the number of distinct creators, node ids `0..creators`.
    #[must_use]
    pub fn with_creators(mut self, creators: u64) -> Self {
        self.creators = creators.max(1);
        self
    }

    /// Sets the payload length of every event.
    #[must_use]
    pub fn with_payload_len(mut self, payload_len: usize) -> Self {
        self.payload_len = payload_len;
        self
    }

    /// Generates one event born in `round`.
    pub fn event(&mut self, round: i64) -> Event {
        let creator = NodeId(self.rng.gen_range(0..self.creators));
        let transaction_count = self.rng.gen_range(0..8);
        let mut payload = vec![0u8; self.payload_len];
        self.rng.fill(payload.as_mut_slice());
        Event::new(round, creator, transaction_count, Bytes::from(payload))
    }

    /// Generates one event per round.
    pub fn events(&mut self, rounds: impl IntoIterator<Item = i64>) -> Vec<Event> {
        rounds.into_iter().map(|round| self.event(round)).collect()
    }
}

/// A replay target that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    /// Events received, in order.
    pub events: Vec<Event>,
    /// How many more health checks report unhealthy.
    pub unhealthy_checks: std::cell::Cell<usize>,
    /// Whether intake was flushed.
    pub intake_flushed: bool,
    /// Whether transaction handling was flushed.
    pub transactions_flushed: bool,
}

impl RecordingTarget {
    /// Creates a target that reports unhealthy for the first `checks` checks.
    pub fn unhealthy_for(checks: usize) -> Self {
        Self {
            unhealthy_checks: std::cell::Cell::new(checks),
            ..Self::default()
        }
    }
}

impl ReplayTarget for RecordingTarget {
    fn forward(&mut self, event: Event) -> CoreResult<()> {
        self.events.push(event);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        let remaining = self.unhealthy_checks.get();
        if remaining == 0 {
            return true;
        }
        self.unhealthy_checks.set(remaining - 1);
        false
    }

    fn flush_intake(&mut self) -> CoreResult<()> {
        self.intake_flushed = true;
        Ok(())
    }

    fn flush_transaction_handling(&mut self) -> CoreResult<()> {
        self.transactions_flushed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pces_core::NO_LOWER_BOUND;

    #[test]
    fn generator_is_deterministic() {
        let a = EventGenerator::new(42).events(0..10);
        let b = EventGenerator::new(42).events(0..10);
        assert_eq!(a, b);
        assert_eq!(rounds(&a), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn generator_respects_settings() {
        let event = EventGenerator::new(1)
            .with_creators(1)
            .with_payload_len(5)
            .event(3);
        assert_eq!(event.creator(), NodeId(0));
        assert_eq!(event.payload().len(), 5);
        assert_eq!(event.encoded_len(), pces_core::EVENT_HEADER_SIZE + 5);
    }

    #[test]
    fn written_events_replay() {
        let stream = TestStream::new();
        let mut manager = stream.open_streaming(PcesConfig::default(), 0);
        write_events(&mut manager, &EventGenerator::new(3).events([4, 2, 9]));
        manager.close_current_segment().unwrap();

        assert_eq!(stream.segments().len(), 1);
        assert_eq!(stream.replay_rounds(PcesConfig::default(), NO_LOWER_BOUND, 0), vec![4, 2, 9]);
    }

    #[test]
    fn segment_size_matches_disk() {
        let stream = TestStream::new();
        let mut manager = stream.open_streaming(PcesConfig::default(), 0);
        write_events(
            &mut manager,
            &EventGenerator::new(0).with_payload_len(10).events(1..=3),
        );
        manager.close_current_segment().unwrap();

        let segment = &stream.segments()[0];
        let on_disk = std::fs::metadata(segment.path()).unwrap().len();
        assert_eq!(on_disk, segment_size(3, 10));
    }

    #[test]
    fn recording_target_health_countdown() {
        let target = RecordingTarget::unhealthy_for(2);
        assert!(!target.is_healthy());
        assert!(!target.is_healthy());
        assert!(target.is_healthy());
    }
}
