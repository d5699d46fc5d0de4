//! # PCES Testkit
//!
//! Test utilities for the preconsensus event stream.
//!
//! This crate provides:
//! - Temporary stream directories wired to a fake clock and shared metrics
//! - Deterministic event generators
//! - A recording replay target
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use pces_testkit::prelude::*;
//!
//! let stream = TestStream::new();
//! let mut manager = stream.open_streaming(PcesConfig::default(), 0);
//! let events = EventGenerator::new(7).events(1..=5);
//! write_events(&mut manager, &events);
//! manager.close_current_segment().unwrap();
//!
//! assert_eq!(stream.replay_rounds(PcesConfig::default(), NO_LOWER_BOUND, 0), vec![1, 2, 3, 4, 5]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use pces_core::{
        Event, EventWindow, NodeId, PcesConfig, ReplayRequest, SegmentManager, SyncOption,
        NO_LOWER_BOUND,
    };
}

pub use fixtures::*;
pub use generators::*;
