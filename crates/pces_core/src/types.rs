//! Core type definitions for the event stream.

use crate::error::{CoreError, CoreResult};
use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the node that created an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Creates a new node ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Size of the fixed event fields: birth round, creator, transaction count.
pub const EVENT_HEADER_SIZE: usize = 8 + 8 + 4;

/// A preconsensus event.
///
/// The stream only looks at the birth round (which is the ancient indicator)
/// and, for the sync policy, the creator. The payload is carried verbatim.
///
/// Encoded as `[i64 birth_round][u64 creator][u32 transaction_count][payload]`,
/// big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    birth_round: i64,
    creator: NodeId,
    transaction_count: u32,
    payload: Bytes,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(birth_round: i64, creator: NodeId, transaction_count: u32, payload: Bytes) -> Self {
        Self {
            birth_round,
            creator,
            transaction_count,
            payload,
        }
    }

    /// Returns the round in which the event was created.
    #[must_use]
    pub fn birth_round(&self) -> i64 {
        self.birth_round
    }

    /// Returns the ordering key used for segment membership.
    #[must_use]
    pub fn ancient_indicator(&self) -> i64 {
        self.birth_round
    }

    /// Returns the creator of the event.
    #[must_use]
    pub fn creator(&self) -> NodeId {
        self.creator
    }

    /// Returns the number of transactions carried by the event.
    #[must_use]
    pub fn transaction_count(&self) -> u32 {
        self.transaction_count
    }

    /// Returns the opaque payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the encoded size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        EVENT_HEADER_SIZE + self.payload.len()
    }

    /// Appends the encoded event to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.encoded_len());
        buf.put_i64(self.birth_round);
        buf.put_u64(self.creator.0);
        buf.put_u32(self.transaction_count);
        buf.put_slice(&self.payload);
    }

    /// Decodes an event from one segment record.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the record is shorter than the fixed fields.
    pub fn decode(mut record: Bytes) -> CoreResult<Self> {
        if record.len() < EVENT_HEADER_SIZE {
            return Err(CoreError::corruption(format!(
                "event record too short: {} bytes",
                record.len()
            )));
        }

        let birth_round = record.get_i64();
        let creator = NodeId(record.get_u64());
        let transaction_count = record.get_u32();

        Ok(Self {
            birth_round,
            creator,
            transaction_count,
            payload: record,
        })
    }
}

/// The current window of non-ancient events.
///
/// Events whose ancient indicator is below `ancient_threshold` are ancient and
/// are never written to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    latest_consensus_round: i64,
    ancient_threshold: i64,
}

impl EventWindow {
    /// Creates a new event window.
    #[must_use]
    pub const fn new(latest_consensus_round: i64, ancient_threshold: i64) -> Self {
        Self {
            latest_consensus_round,
            ancient_threshold,
        }
    }

    /// Returns the latest round that has reached consensus.
    #[must_use]
    pub const fn latest_consensus_round(&self) -> i64 {
        self.latest_consensus_round
    }

    /// Returns the lowest non-ancient indicator.
    #[must_use]
    pub const fn ancient_threshold(&self) -> i64 {
        self.ancient_threshold
    }

    /// Returns `true` if an event with this indicator is ancient.
    #[must_use]
    pub const fn is_ancient(&self, indicator: i64) -> bool {
        indicator < self.ancient_threshold
    }
}

impl fmt::Display for EventWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventWindow(latest_consensus_round={}, ancient_threshold={})",
            self.latest_consensus_round, self.ancient_threshold
        )
    }
}
