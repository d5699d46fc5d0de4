//! Dump command implementation.

use pces_core::segment::{scan_segments, PcesEventIterator};
use pces_core::PcesConfig;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;

/// Event representation for output.
#[derive(Debug, Serialize)]
pub struct EventInfo {
    /// Sequence number of the segment holding the event.
    pub segment: u64,
    /// Birth round, which is also the ancient indicator.
    pub birth_round: i64,
    /// Creator node.
    pub creator: u64,
    /// Number of transactions.
    pub transaction_count: u32,
    /// Payload size in bytes.
    pub payload_size: usize,
}

/// Reads up to `limit` events at or above `lower_bound`, oldest first.
pub fn read_events(
    path: &Path,
    config: &PcesConfig,
    lower_bound: i64,
    limit: Option<usize>,
) -> Result<Vec<EventInfo>, Box<dyn std::error::Error>> {
    let tracker = scan_segments(path, config.permit_gaps)?;
    let limit = limit.unwrap_or(usize::MAX);
    let mut events = Vec::new();

    // One segment at a time so each event can be tagged with its segment.
    for descriptor in tracker.iter() {
        if events.len() >= limit {
            break;
        }
        let segment = descriptor.sequence();
        let iter = PcesEventIterator::new(VecDeque::from([descriptor.clone()]), lower_bound);
        for event in iter.take(limit - events.len()) {
            let event = event?;
            events.push(EventInfo {
                segment,
                birth_round: event.birth_round(),
                creator: event.creator().as_u64(),
                transaction_count: event.transaction_count(),
                payload_size: event.payload().len(),
            });
        }
    }

    Ok(events)
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    config: &PcesConfig,
    lower_bound: i64,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No stream found at {}", path.display()).into());
    }

    let events = read_events(path, config, lower_bound, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        _ => {
            print_text_output(&events);
        }
    }

    Ok(())
}

fn print_text_output(events: &[EventInfo]) {
    println!(
        "{:>8}  {:>10}  {:>8}  {:>6}  {:>8}",
        "segment", "round", "creator", "txs", "payload"
    );
    for event in events {
        println!(
            "{:>8}  {:>10}  {:>8}  {:>6}  {:>8}",
            event.segment,
            event.birth_round,
            event.creator,
            event.transaction_count,
            event.payload_size
        );
    }
    println!();
    println!("{} events", events.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_stream;
    use pces_core::NO_LOWER_BOUND;
    use tempfile::tempdir;

    #[test]
    fn dumps_in_write_order() {
        let dir = tempdir().unwrap();
        write_stream(dir.path(), &[3, 1, 2]);

        let events = read_events(dir.path(), &PcesConfig::default(), NO_LOWER_BOUND, None).unwrap();

        let rounds: Vec<_> = events.iter().map(|e| e.birth_round).collect();
        assert_eq!(rounds, vec![3, 1, 2]);
        assert_eq!(events[0].creator, 4);
        assert_eq!(events[0].transaction_count, 2);
        assert_eq!(events[0].payload_size, 7);
    }

    #[test]
    fn honors_limit_and_lower_bound() {
        let dir = tempdir().unwrap();
        write_stream(dir.path(), &[1, 5, 2, 6, 7]);

        let events = read_events(dir.path(), &PcesConfig::default(), 5, Some(2)).unwrap();

        let rounds: Vec<_> = events.iter().map(|e| e.birth_round).collect();
        assert_eq!(rounds, vec![5, 6]);
    }
}
