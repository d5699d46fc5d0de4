//! Property-based test generators using proptest.
//!
//! Provides strategies for events, write schedules and stream settings.

use bytes::Bytes;
use pces_core::{Event, NodeId, SyncOption, WriterKind};
use proptest::prelude::*;

/// Strategy for generating events born in `rounds`.
pub fn event_strategy(rounds: std::ops::Range<i64>) -> impl Strategy<Value = Event> {
    (
        rounds,
        0u64..8,
        0u32..16,
        prop::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(round, creator, transactions, payload)| {
            Event::new(round, NodeId(creator), transactions, Bytes::from(payload))
        })
}

/// Strategy for generating a run of events in arbitrary round order.
pub fn event_sequence_strategy(
    rounds: std::ops::Range<i64>,
    max_len: usize,
) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(event_strategy(rounds), 1..max_len)
}

/// One step of a live write schedule.
#[derive(Debug, Clone)]
pub enum StreamOperation {
    /// Write an event.
    Write(Event),
    /// Raise the non-ancient boundary by this much.
    AdvanceBoundary(i64),
    /// Close the open segment.
    Close,
}

/// Strategy for generating a single schedule step.
pub fn stream_operation_strategy() -> impl Strategy<Value = StreamOperation> {
    prop_oneof![
        8 => event_strategy(0..200).prop_map(StreamOperation::Write),
        1 => (0i64..10).prop_map(StreamOperation::AdvanceBoundary),
        1 => Just(StreamOperation::Close),
    ]
}

/// Strategy for generating a write schedule.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StreamOperation>> {
    prop::collection::vec(stream_operation_strategy(), min_ops..max_ops)
}

/// Strategy for choosing a writer backend.
pub fn writer_kind_strategy() -> impl Strategy<Value = WriterKind> {
    prop::sample::select(WriterKind::ALL.to_vec())
}

/// Strategy for choosing a sync policy.
pub fn sync_option_strategy() -> impl Strategy<Value = SyncOption> {
    prop_oneof![
        Just(SyncOption::DontSync),
        Just(SyncOption::EveryEvent),
        Just(SyncOption::EverySelfEvent),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 500,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests. Every case touches the filesystem.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 16,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
