//! # PCES Core
//!
//! The preconsensus event stream: a durable, append-only log of events
//! written before consensus, split into bounded segment files.
//!
//! This crate provides:
//! - Segment descriptors, naming and on-disk discovery
//! - [`SegmentManager`] for rotation, span sizing, discontinuities and pruning
//! - [`InlinePcesWriter`] for the live write path with a configurable sync policy
//! - [`Replayer`] for delivering the stream to the pipeline at startup
//! - [`filter_stream`] for rewriting a stream against a saved state
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use pces_core::{
//!     Event, NodeId, PcesConfig, PcesMetrics, ReplayRequest, SegmentManager, SystemClock,
//!     NO_LOWER_BOUND,
//! };
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut manager = SegmentManager::open(
//!     PcesConfig::default(),
//!     dir.path(),
//!     0,
//!     Arc::new(SystemClock),
//!     Arc::new(PcesMetrics::new()),
//! )
//! .unwrap();
//! manager.begin_streaming_new_events();
//!
//! let event = Event::new(3, NodeId(1), 0, Bytes::from_static(b"payload"));
//! manager.prepare_output_stream(&event).unwrap();
//! manager.write_event(&event).unwrap();
//! manager.close_current_segment().unwrap();
//!
//! let replayed: Vec<_> = manager
//!     .event_iterator(ReplayRequest::new(NO_LOWER_BOUND, 0))
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(replayed, vec![event]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod average;
mod clock;
mod config;
mod error;
mod filter;
mod manager;
mod metrics;
mod replay;
pub mod segment;
mod types;
mod writer;

pub use clock::{FakeTime, SystemClock, Time};
pub use config::{PcesConfig, SyncOption};
pub use error::{CoreError, CoreResult};
pub use filter::{filter_stream, FilterOutcome, SavedStateMetadata, STATE_METADATA_FILE};
pub use manager::{ReplayRequest, SegmentManager};
pub use metrics::{MetricsSnapshot, PcesMetrics};
pub use replay::{
    LatestState, RateLimiter, ReplayInterrupt, ReplayState, ReplaySummary, ReplayTarget,
    Replayer, StateInfo, HEALTH_POLL_INTERVAL,
};
pub use segment::{
    PcesEventIterator, SegmentDescriptor, SegmentEventIterator, SegmentTracker, NO_LOWER_BOUND,
};
pub use types::{Event, EventWindow, NodeId, EVENT_HEADER_SIZE};
pub use writer::InlinePcesWriter;

pub use pces_storage::WriterKind;
