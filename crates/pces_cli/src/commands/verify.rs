//! Verify command implementation.

use pces_core::segment::{scan_segments, SegmentEventIterator};
use pces_core::{PcesConfig, NO_LOWER_BOUND};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Number of events read.
    pub events_checked: u64,
    /// Segments that end in a partial write.
    pub truncated_segments: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Returns `true` if no errors were found. Truncated tails are tolerated.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks segment ordering and reads every event of every segment.
///
/// The stream is only read.
pub fn verify(path: &Path, config: &PcesConfig) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();

    let tracker = match scan_segments(path, config.permit_gaps) {
        Ok(tracker) => tracker,
        Err(e) => {
            result.errors.push(format!("segment scan failed: {e}"));
            return Ok(result);
        }
    };

    for descriptor in tracker.iter() {
        result.segments_checked += 1;

        let mut events = match SegmentEventIterator::open(descriptor.clone(), NO_LOWER_BOUND) {
            Ok(events) => events,
            Err(e) => {
                result.errors.push(format!("{descriptor}: {e}"));
                continue;
            }
        };

        for event in events.by_ref() {
            match event {
                Ok(event) => {
                    result.events_checked += 1;
                    let indicator = event.ancient_indicator();
                    if !descriptor.can_contain(indicator) {
                        result.errors.push(format!(
                            "{descriptor}: event with indicator {indicator} is outside the segment bounds"
                        ));
                    }
                }
                Err(e) => {
                    result.errors.push(format!("{descriptor}: {e}"));
                    break;
                }
            }
        }

        if events.is_truncated() {
            result.truncated_segments += 1;
        }
    }

    Ok(result)
}

/// Runs the verify command.
pub fn run(path: &Path, config: &PcesConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying stream at {}", path.display());
    println!();

    let result = verify(path, config)?;

    println!("Segments checked:   {}", result.segments_checked);
    println!("Events checked:     {}", result.events_checked);
    println!("Truncated segments: {}", result.truncated_segments);
    for error in &result.errors {
        println!("  ERROR: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Stream verification passed");
        Ok(())
    } else {
        println!("✗ Stream verification failed");
        Err("Verification failed".into())
    }
}
