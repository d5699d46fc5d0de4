//! Inspect command implementation.

use super::format_size;
use chrono::{DateTime, Utc};
use pces_core::segment::scan_segments;
use pces_core::PcesConfig;
use serde::Serialize;
use std::path::Path;

/// Stream inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Stream directory.
    pub path: String,
    /// Number of segments.
    pub segment_count: usize,
    /// Total size in bytes.
    pub total_size: u64,
    /// Lowest lower bound across segments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_lower_bound: Option<i64>,
    /// Highest upper bound across segments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youngest_upper_bound: Option<i64>,
    /// Per-segment details, oldest first.
    pub segments: Vec<SegmentInfo>,
}

/// One segment as listed by `inspect`.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Sequence number.
    pub sequence: u64,
    /// Lower bound.
    pub lower_bound: i64,
    /// Upper bound.
    pub upper_bound: i64,
    /// Origin round.
    pub origin: i64,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// File size in bytes.
    pub size: u64,
    /// File path.
    pub path: String,
}

/// Scans `path` without modifying it.
pub fn inspect(path: &Path, config: &PcesConfig) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No stream found at {}", path.display()).into());
    }

    let tracker = scan_segments(path, config.permit_gaps)?;
    let segments = tracker
        .iter()
        .map(|desc| {
            Ok::<_, std::io::Error>(SegmentInfo {
                sequence: desc.sequence(),
                lower_bound: desc.lower_bound(),
                upper_bound: desc.upper_bound(),
                origin: desc.origin(),
                timestamp: desc.timestamp(),
                size: std::fs::metadata(desc.path())?.len(),
                path: desc.path().display().to_string(),
            })
        })
        .collect::<Result<Vec<_>, std::io::Error>>()?;

    Ok(InspectResult {
        path: path.display().to_string(),
        segment_count: segments.len(),
        total_size: segments.iter().map(|s| s.size).sum(),
        oldest_lower_bound: tracker.first().map(|d| d.lower_bound()),
        youngest_upper_bound: tracker.last().map(|d| d.upper_bound()),
        segments,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, config: &PcesConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, config)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Preconsensus Event Stream");
    println!("=========================");
    println!();
    println!("Path:     {}", result.path);
    println!("Segments: {}", result.segment_count);
    println!("Size:     {}", format_size(result.total_size));
    if let (Some(lower), Some(upper)) = (result.oldest_lower_bound, result.youngest_upper_bound) {
        println!("Bounds:   [{lower}, {upper}]");
    }

    if result.segments.is_empty() {
        return;
    }
    println!();
    println!(
        "{:>8}  {:>10}  {:>10}  {:>10}  {:>10}  created",
        "seq", "lower", "upper", "origin", "size"
    );
    for segment in &result.segments {
        println!(
            "{:>8}  {:>10}  {:>10}  {:>10}  {:>10}  {}",
            segment.sequence,
            segment.lower_bound,
            segment.upper_bound,
            segment.origin,
            format_size(segment.size),
            segment.timestamp.to_rfc3339()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_stream;
    use tempfile::tempdir;

    #[test]
    fn lists_segments() {
        let dir = tempdir().unwrap();
        write_stream(dir.path(), &[1, 2, 3]);

        let result = inspect(dir.path(), &PcesConfig::default()).unwrap();

        assert_eq!(result.segment_count, 1);
        assert_eq!(result.segments[0].sequence, 0);
        assert_eq!(result.oldest_lower_bound, Some(0));
        assert_eq!(result.youngest_upper_bound, Some(result.segments[0].upper_bound));
        assert!(result.total_size > 0);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(inspect(&dir.path().join("absent"), &PcesConfig::default()).is_err());
    }

    #[test]
    fn json_output_has_segments() {
        let dir = tempdir().unwrap();
        write_stream(dir.path(), &[7]);

        let result = inspect(dir.path(), &PcesConfig::default()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["segment_count"], 1);
        assert_eq!(json["segments"][0]["origin"], 0);
    }
}
