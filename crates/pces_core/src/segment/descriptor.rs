//! Segment descriptors and on-disk naming.
//!
//! A segment's identity lives entirely in its file name:
//!
//! ```text
//! <root>/YYYY/MM/DD/YYYY-MM-DDTHH+MM+SS.nnnnnnnnnZ_seq<20 digits>_minr<lower>_maxr<upper>_orgn<origin>.pces
//! ```
//!
//! The fixed-width timestamp followed by the zero-padded sequence number makes
//! a lexicographic listing match creation order, so a directory scan rebuilds
//! the stream without any side index.

use crate::error::{CoreError, CoreResult};
use crate::segment::sync_directory;
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of segment files.
pub const SEGMENT_EXTENSION: &str = "pces";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H+%M+%S%.9fZ";
const SEQUENCE_PREFIX: &str = "seq";
const LOWER_BOUND_PREFIX: &str = "minr";
const UPPER_BOUND_PREFIX: &str = "maxr";
const ORIGIN_PREFIX: &str = "orgn";

/// Immutable description of one segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    sequence: u64,
    lower_bound: i64,
    upper_bound: i64,
    origin: i64,
    timestamp: DateTime<Utc>,
    path: PathBuf,
}

impl SegmentDescriptor {
    /// Describes a new segment under `root`.
    ///
    /// # Errors
    ///
    /// Returns an illegal argument error if `lower_bound > upper_bound`.
    pub fn new(
        root: &Path,
        timestamp: DateTime<Utc>,
        sequence: u64,
        lower_bound: i64,
        upper_bound: i64,
        origin: i64,
    ) -> CoreResult<Self> {
        if lower_bound > upper_bound {
            return Err(CoreError::illegal_argument(format!(
                "lower bound {lower_bound} exceeds upper bound {upper_bound}"
            )));
        }

        let path = root
            .join(format!("{:04}", timestamp.year()))
            .join(format!("{:02}", timestamp.month()))
            .join(format!("{:02}", timestamp.day()))
            .join(file_name(timestamp, sequence, lower_bound, upper_bound, origin));

        Ok(Self {
            sequence,
            lower_bound,
            upper_bound,
            origin,
            timestamp,
            path,
        })
    }

    /// Parses a descriptor from the name of an existing segment file.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the name is not a segment name.
    pub fn parse(path: &Path) -> CoreResult<Self> {
        let bad = |reason: &str| {
            CoreError::corruption(format!("invalid segment name {}: {reason}", path.display()))
        };

        if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXTENSION) {
            return Err(bad("wrong extension"));
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| bad("not valid UTF-8"))?;

        let parts: Vec<&str> = stem.split('_').collect();
        let [timestamp, sequence, lower, upper, origin] = parts.as_slice() else {
            return Err(bad("expected five fields"));
        };

        let naive = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| bad(&format!("timestamp: {e}")))?;
        let sequence = field(sequence, SEQUENCE_PREFIX).ok_or_else(|| bad("sequence"))?;
        let lower_bound = field(lower, LOWER_BOUND_PREFIX).ok_or_else(|| bad("lower bound"))?;
        let upper_bound = field(upper, UPPER_BOUND_PREFIX).ok_or_else(|| bad("upper bound"))?;
        let origin = field(origin, ORIGIN_PREFIX).ok_or_else(|| bad("origin"))?;

        if lower_bound > upper_bound {
            return Err(bad("lower bound exceeds upper bound"));
        }

        Ok(Self {
            sequence,
            lower_bound,
            upper_bound,
            origin,
            timestamp: Utc.from_utc_datetime(&naive),
            path: path.to_path_buf(),
        })
    }

    /// Returns the sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the lowest indicator this segment may hold.
    #[must_use]
    pub fn lower_bound(&self) -> i64 {
        self.lower_bound
    }

    /// Returns the highest indicator this segment may hold.
    #[must_use]
    pub fn upper_bound(&self) -> i64 {
        self.upper_bound
    }

    /// Returns the origin marker.
    #[must_use]
    pub fn origin(&self) -> i64 {
        self.origin
    }

    /// Returns the creation time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `upper_bound - lower_bound`.
    #[must_use]
    pub fn span(&self) -> i64 {
        self.upper_bound - self.lower_bound
    }

    /// Returns `true` if an event with this indicator belongs in this segment.
    #[must_use]
    pub fn can_contain(&self, indicator: i64) -> bool {
        self.lower_bound <= indicator && indicator <= self.upper_bound
    }

    /// Returns the same segment with a smaller upper bound, at a path that
    /// reflects it. The file itself is not touched.
    ///
    /// # Errors
    ///
    /// Returns an illegal argument error if the new bound is above the
    /// current upper bound or below the lower bound.
    pub fn with_compressed_upper_bound(&self, upper_bound: i64) -> CoreResult<Self> {
        if upper_bound > self.upper_bound {
            return Err(CoreError::illegal_argument(format!(
                "compressed upper bound {upper_bound} exceeds current upper bound {}",
                self.upper_bound
            )));
        }
        if upper_bound < self.lower_bound {
            return Err(CoreError::illegal_argument(format!(
                "compressed upper bound {upper_bound} is below lower bound {}",
                self.lower_bound
            )));
        }

        let name = file_name(
            self.timestamp,
            self.sequence,
            self.lower_bound,
            upper_bound,
            self.origin,
        );
        Ok(Self {
            upper_bound,
            path: self.path.with_file_name(name),
            ..self.clone()
        })
    }

    /// Deletes the file, then any date directories left empty, stopping at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn delete_file(&self, root: &Path) -> CoreResult<()> {
        fs::remove_file(&self.path)?;

        let mut dir = self.path.parent();
        while let Some(current) = dir {
            if current == root || !current.starts_with(root) {
                break;
            }
            // Fails when the directory still has entries.
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }

        if let Some(parent) = self.path.parent().filter(|p| p.exists()) {
            sync_directory(parent)?;
        }
        Ok(())
    }
}

impl fmt::Display for SegmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment {} [{}, {}] origin {} created {}",
            self.sequence,
            self.lower_bound,
            self.upper_bound,
            self.origin,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }
}

fn file_name(
    timestamp: DateTime<Utc>,
    sequence: u64,
    lower_bound: i64,
    upper_bound: i64,
    origin: i64,
) -> String {
    format!(
        "{}_{SEQUENCE_PREFIX}{sequence:020}_{LOWER_BOUND_PREFIX}{lower_bound}_{UPPER_BOUND_PREFIX}{upper_bound}_{ORIGIN_PREFIX}{origin}.{SEGMENT_EXTENSION}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

fn field<T: std::str::FromStr>(part: &str, prefix: &str) -> Option<T> {
    part.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(seconds: i64, nanos: u32) -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200 + seconds, nanos).unwrap()
    }

    #[test]
    fn path_layout() {
        let root = Path::new("/stream");
        let desc = SegmentDescriptor::new(root, at(3_661, 5), 7, 10, 20, 3).unwrap();

        assert_eq!(
            desc.path(),
            Path::new(
                "/stream/2024/01/01/2024-01-01T01+01+01.000000005Z_seq00000000000000000007_minr10_maxr20_orgn3.pces"
            )
        );
    }

    #[test]
    fn parse_recovers_every_field() {
        let root = Path::new("/stream");
        let desc = SegmentDescriptor::new(root, at(42, 123_456_789), 12, -1, 99, 8).unwrap();

        let parsed = SegmentDescriptor::parse(desc.path()).unwrap();
        assert_eq!(parsed, desc);
    }

    #[test]
    fn parse_rejects_foreign_names() {
        for name in [
            "notes.txt",
            "2024-01-01T00+00+00.000000000Z_seq1_minr0_maxr1.pces",
            "garbage_seq1_minr0_maxr1_orgn0.pces",
            "2024-01-01T00+00+00.000000000Z_seqX_minr0_maxr1_orgn0.pces",
            "2024-01-01T00+00+00.000000000Z_seq1_minr5_maxr1_orgn0.pces",
        ] {
            assert!(SegmentDescriptor::parse(Path::new(name)).is_err(), "{name}");
        }
    }

    #[test]
    fn names_sort_in_creation_order() {
        let root = Path::new("/s");
        let mut names = vec![
            SegmentDescriptor::new(root, at(0, 0), 0, 0, 1, 0).unwrap(),
            SegmentDescriptor::new(root, at(0, 0), 1, 0, 1, 0).unwrap(),
            SegmentDescriptor::new(root, at(0, 1), 2, 0, 1, 0).unwrap(),
            SegmentDescriptor::new(root, at(0, 0) + Duration::days(40), 3, 0, 1, 0).unwrap(),
        ]
        .into_iter()
        .map(|d| d.path().to_path_buf())
        .collect::<Vec<_>>();
        let expected = names.clone();

        names.reverse();
        names.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn can_contain_is_closed_range() {
        let desc = SegmentDescriptor::new(Path::new("/s"), at(0, 0), 0, 10, 20, 0).unwrap();
        assert!(!desc.can_contain(9));
        assert!(desc.can_contain(10));
        assert!(desc.can_contain(20));
        assert!(!desc.can_contain(21));
        assert_eq!(desc.span(), 10);
    }

    #[test]
    fn inverted_bounds_rejected() {
        let result = SegmentDescriptor::new(Path::new("/s"), at(0, 0), 0, 5, 4, 0);
        assert!(matches!(result, Err(CoreError::IllegalArgument { .. })));
    }

    #[test]
    fn compressed_upper_bound() {
        let desc = SegmentDescriptor::new(Path::new("/s"), at(0, 0), 4, 10, 100, 2).unwrap();
        let compressed = desc.with_compressed_upper_bound(40).unwrap();

        assert_eq!(compressed.upper_bound(), 40);
        assert_eq!(compressed.sequence(), 4);
        assert_eq!(compressed.path().parent(), desc.path().parent());
        assert_eq!(SegmentDescriptor::parse(compressed.path()).unwrap(), compressed);

        assert!(desc.with_compressed_upper_bound(101).is_err());
        assert!(desc.with_compressed_upper_bound(9).is_err());
    }

    #[test]
    fn delete_removes_empty_date_directories() {
        let dir = tempfile::tempdir().unwrap();
        let desc = SegmentDescriptor::new(dir.path(), at(0, 0), 0, 0, 1, 0).unwrap();
        fs::create_dir_all(desc.path().parent().unwrap()).unwrap();
        fs::write(desc.path(), b"").unwrap();

        desc.delete_file(dir.path()).unwrap();

        assert!(!desc.path().exists());
        assert!(!dir.path().join("2024").exists());
        assert!(dir.path().exists());
    }
}
