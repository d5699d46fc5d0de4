//! Stream metrics.
//!
//! A single [`PcesMetrics`] is created per process and shared as an
//! `Arc<PcesMetrics>` with every component that reports. All values are
//! atomics and may be read by a reporting thread while the stream is written.

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Stream gauges and counters.
#[derive(Debug, Default)]
pub struct PcesMetrics {
    // File gauges
    /// Number of segments on disk.
    file_count: AtomicU64,
    /// Total size of all segments, in bytes.
    total_file_bytes: AtomicU64,
    /// Lower bound of the oldest segment.
    oldest_lower_bound: AtomicI64,
    /// Upper bound of the youngest segment.
    youngest_upper_bound: AtomicI64,
    /// Age of the oldest segment, in seconds.
    oldest_file_age_seconds: AtomicU64,

    // Span gauges
    /// Span of the most recently closed segment.
    last_span: AtomicI64,
    /// Unused span of the most recently closed segment.
    last_unutilized_span: AtomicI64,

    // Write counters
    /// Segments created.
    files_written: AtomicU64,
    /// Events written to the stream.
    events_written: AtomicU64,
    /// Bytes written to the stream.
    bytes_written: AtomicU64,
    /// Explicit syncs issued.
    syncs: AtomicU64,

    // Replay counters
    /// Events forwarded during replay.
    events_replayed: AtomicU64,
    /// Transactions contained in replayed events.
    transactions_replayed: AtomicU64,
}

impl PcesMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_file_count(&self, count: u64) {
        self.file_count.store(count, Ordering::Relaxed);
    }

    pub(crate) fn set_total_file_bytes(&self, bytes: u64) {
        self.total_file_bytes.store(bytes, Ordering::Relaxed);
    }

    pub(crate) fn set_oldest_lower_bound(&self, bound: i64) {
        self.oldest_lower_bound.store(bound, Ordering::Relaxed);
    }

    pub(crate) fn set_youngest_upper_bound(&self, bound: i64) {
        self.youngest_upper_bound.store(bound, Ordering::Relaxed);
    }

    pub(crate) fn set_oldest_file_age_seconds(&self, seconds: u64) {
        self.oldest_file_age_seconds.store(seconds, Ordering::Relaxed);
    }

    pub(crate) fn record_closed_span(&self, span: i64, unutilized: i64) {
        self.last_span.store(span, Ordering::Relaxed);
        self.last_unutilized_span.store(unutilized, Ordering::Relaxed);
    }

    pub(crate) fn record_file_written(&self) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_event_written(&self, bytes: u64) {
        self.events_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_sync(&self) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_event_replayed(&self, transactions: u64) {
        self.events_replayed.fetch_add(1, Ordering::Relaxed);
        self.transactions_replayed.fetch_add(transactions, Ordering::Relaxed);
    }

    /// Returns the number of segments on disk.
    pub fn file_count(&self) -> u64 {
        self.file_count.load(Ordering::Relaxed)
    }

    /// Returns the total size of all segments.
    pub fn total_file_bytes(&self) -> u64 {
        self.total_file_bytes.load(Ordering::Relaxed)
    }

    /// Returns the number of events written.
    pub fn events_written(&self) -> u64 {
        self.events_written.load(Ordering::Relaxed)
    }

    /// Returns the number of syncs issued.
    pub fn syncs(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }

    /// Returns the number of events replayed.
    pub fn events_replayed(&self) -> u64 {
        self.events_replayed.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            file_count: self.file_count(),
            total_file_bytes: self.total_file_bytes(),
            oldest_lower_bound: self.oldest_lower_bound.load(Ordering::Relaxed),
            youngest_upper_bound: self.youngest_upper_bound.load(Ordering::Relaxed),
            oldest_file_age_seconds: self.oldest_file_age_seconds.load(Ordering::Relaxed),
            last_span: self.last_span.load(Ordering::Relaxed),
            last_unutilized_span: self.last_unutilized_span.load(Ordering::Relaxed),
            files_written: self.files_written.load(Ordering::Relaxed),
            events_written: self.events_written(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            syncs: self.syncs(),
            events_replayed: self.events_replayed(),
            transactions_replayed: self.transactions_replayed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`PcesMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Number of segments on disk.
    pub file_count: u64,
    /// Total size of all segments, in bytes.
    pub total_file_bytes: u64,
    /// Lower bound of the oldest segment.
    pub oldest_lower_bound: i64,
    /// Upper bound of the youngest segment.
    pub youngest_upper_bound: i64,
    /// Age of the oldest segment, in seconds.
    pub oldest_file_age_seconds: u64,
    /// Span of the most recently closed segment.
    pub last_span: i64,
    /// Unused span of the most recently closed segment.
    pub last_unutilized_span: i64,
    /// Segments created.
    pub files_written: u64,
    /// Events written.
    pub events_written: u64,
    /// Bytes written.
    pub bytes_written: u64,
    /// Explicit syncs issued.
    pub syncs: u64,
    /// Events forwarded during replay.
    pub events_replayed: u64,
    /// Transactions in replayed events.
    pub transactions_replayed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let metrics = PcesMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn record_writes_and_syncs() {
        let metrics = PcesMetrics::new();
        metrics.record_event_written(100);
        metrics.record_event_written(50);
        metrics.record_sync();

        let snap = metrics.snapshot();
        assert_eq!(snap.events_written, 2);
        assert_eq!(snap.bytes_written, 150);
        assert_eq!(snap.syncs, 1);
    }

    #[test]
    fn gauges_overwrite() {
        let metrics = PcesMetrics::new();
        metrics.set_file_count(3);
        metrics.set_file_count(2);
        metrics.record_closed_span(10, 4);

        let snap = metrics.snapshot();
        assert_eq!(snap.file_count, 2);
        assert_eq!(snap.last_span, 10);
        assert_eq!(snap.last_unutilized_span, 4);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(PcesMetrics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_event_replayed(2);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.events_replayed, 800);
        assert_eq!(snap.transactions_replayed, 1600);
    }
}
