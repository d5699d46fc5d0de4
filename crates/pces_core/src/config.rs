//! Stream configuration.

use crate::error::{CoreError, CoreResult};
use pces_storage::WriterKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// How often the inline writer forces the open segment to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOption {
    /// Never sync explicitly; rely on rotation and close.
    DontSync,
    /// Sync after every event.
    EveryEvent,
    /// Sync after every event created by this node.
    #[default]
    EverySelfEvent,
}

impl SyncOption {
    /// Returns the configuration name of this option.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SyncOption::DontSync => "dont_sync",
            SyncOption::EveryEvent => "every_event",
            SyncOption::EverySelfEvent => "every_self_event",
        }
    }
}

impl fmt::Display for SyncOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SyncOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dont_sync" => Ok(SyncOption::DontSync),
            "every_event" => Ok(SyncOption::EveryEvent),
            "every_self_event" => Ok(SyncOption::EverySelfEvent),
            other => Err(format!("unknown sync option: {other}")),
        }
    }
}

/// Configuration for the preconsensus event stream.
///
/// Any subset of fields may be given in a JSON file; missing fields keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcesConfig {
    /// Segment size at which the open segment is rotated. Not a hard limit:
    /// an event is never split, so segments may exceed it slightly.
    pub preferred_file_size_megabytes: f64,

    /// Capacity a new segment is guaranteed to have past the event that
    /// caused it to be created.
    pub minimum_span: i64,

    /// Span assumed for the previous segment before any segment has closed.
    pub bootstrap_span: i64,

    /// Span multiplier while in bootstrap mode.
    pub bootstrap_span_overlap_factor: f64,

    /// Span multiplier once a segment has reached the preferred size.
    pub span_overlap_factor: f64,

    /// Number of closed segments averaged when sizing a new span.
    pub span_utilization_running_average_length: usize,

    /// Minimum age before a segment may be pruned.
    pub minimum_retention_period_seconds: u64,

    /// Whether replay is throttled.
    pub limit_replay_frequency: bool,

    /// Maximum replay rate, in events per second, when throttled.
    pub max_event_replay_frequency: u32,

    /// Whether gaps in segment sequence numbers are tolerated at startup.
    pub permit_gaps: bool,

    /// When the inline writer syncs.
    pub sync_option: SyncOption,

    /// Backend used to write segment files.
    pub writer_type: WriterKind,
}

impl Default for PcesConfig {
    fn default() -> Self {
        Self {
            preferred_file_size_megabytes: 10.0,
            minimum_span: 5,
            bootstrap_span: 50,
            bootstrap_span_overlap_factor: 10.0,
            span_overlap_factor: 1.2,
            span_utilization_running_average_length: 5,
            minimum_retention_period_seconds: 60 * 60, // 1 hour
            limit_replay_frequency: false,
            max_event_replay_frequency: 5000,
            permit_gaps: false,
            sync_option: SyncOption::EverySelfEvent,
            writer_type: WriterKind::OutputStream,
        }
    }
}

impl PcesConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is out of range.
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.preferred_file_size_megabytes > 0.0) {
            return Err(CoreError::invalid_config(
                "preferred_file_size_megabytes must be positive",
            ));
        }
        if self.minimum_span < 0 {
            return Err(CoreError::invalid_config("minimum_span must not be negative"));
        }
        if self.bootstrap_span < 0 {
            return Err(CoreError::invalid_config("bootstrap_span must not be negative"));
        }
        if !(self.bootstrap_span_overlap_factor > 1.0) {
            return Err(CoreError::invalid_config(
                "bootstrap_span_overlap_factor must be greater than 1",
            ));
        }
        if !(self.span_overlap_factor > 1.0) {
            return Err(CoreError::invalid_config(
                "span_overlap_factor must be greater than 1",
            ));
        }
        if self.span_utilization_running_average_length == 0 {
            return Err(CoreError::invalid_config(
                "span_utilization_running_average_length must be positive",
            ));
        }
        if self.max_event_replay_frequency == 0 {
            return Err(CoreError::invalid_config(
                "max_event_replay_frequency must be positive",
            ));
        }
        if i64::try_from(self.minimum_retention_period_seconds).is_err() {
            return Err(CoreError::invalid_config(
                "minimum_retention_period_seconds is too large",
            ));
        }
        Ok(())
    }

    /// Returns the rotation threshold in bytes.
    #[must_use]
    pub fn preferred_file_size_bytes(&self) -> f64 {
        self.preferred_file_size_megabytes * 1024.0 * 1024.0
    }

    /// Returns the minimum retention period.
    #[must_use]
    pub fn minimum_retention_period(&self) -> Duration {
        Duration::from_secs(self.minimum_retention_period_seconds)
    }

    /// Sets the preferred segment size.
    #[must_use]
    pub const fn preferred_file_size_megabytes(mut self, value: f64) -> Self {
        self.preferred_file_size_megabytes = value;
        self
    }

    /// Sets the minimum span.
    #[must_use]
    pub const fn minimum_span(mut self, value: i64) -> Self {
        self.minimum_span = value;
        self
    }

    /// Sets the bootstrap span.
    #[must_use]
    pub const fn bootstrap_span(mut self, value: i64) -> Self {
        self.bootstrap_span = value;
        self
    }

    /// Sets the bootstrap overlap factor.
    #[must_use]
    pub const fn bootstrap_span_overlap_factor(mut self, value: f64) -> Self {
        self.bootstrap_span_overlap_factor = value;
        self
    }

    /// Sets the steady-state overlap factor.
    #[must_use]
    pub const fn span_overlap_factor(mut self, value: f64) -> Self {
        self.span_overlap_factor = value;
        self
    }

    /// Sets the span utilization averaging window.
    #[must_use]
    pub const fn span_utilization_running_average_length(mut self, value: usize) -> Self {
        self.span_utilization_running_average_length = value;
        self
    }

    /// Sets the minimum retention period.
    #[must_use]
    pub const fn minimum_retention_period_seconds(mut self, value: u64) -> Self {
        self.minimum_retention_period_seconds = value;
        self
    }

    /// Enables or disables the replay throttle.
    #[must_use]
    pub const fn limit_replay_frequency(mut self, value: bool) -> Self {
        self.limit_replay_frequency = value;
        self
    }

    /// Sets the throttled replay rate.
    #[must_use]
    pub const fn max_event_replay_frequency(mut self, value: u32) -> Self {
        self.max_event_replay_frequency = value;
        self
    }

    /// Sets whether sequence gaps are tolerated.
    #[must_use]
    pub const fn permit_gaps(mut self, value: bool) -> Self {
        self.permit_gaps = value;
        self
    }

    /// Sets the sync policy.
    #[must_use]
    pub const fn sync_option(mut self, value: SyncOption) -> Self {
        self.sync_option = value;
        self
    }

    /// Sets the writer backend.
    #[must_use]
    pub const fn writer_type(mut self, value: WriterKind) -> Self {
        self.writer_type = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PcesConfig::default();
        assert_eq!(config.minimum_span, 5);
        assert_eq!(config.sync_option, SyncOption::EverySelfEvent);
        assert_eq!(config.writer_type, WriterKind::OutputStream);
        assert!(!config.permit_gaps);
        config.validate().unwrap();
    }

    #[test]
    fn builder_pattern() {
        let config = PcesConfig::new()
            .minimum_span(10)
            .permit_gaps(true)
            .sync_option(SyncOption::EveryEvent)
            .writer_type(WriterKind::FileChannelSync);

        assert_eq!(config.minimum_span, 10);
        assert!(config.permit_gaps);
        assert_eq!(config.sync_option, SyncOption::EveryEvent);
        assert_eq!(config.writer_type, WriterKind::FileChannelSync);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PcesConfig =
            serde_json::from_str(r#"{"minimum_span": 7, "sync_option": "dont_sync"}"#).unwrap();

        assert_eq!(config.minimum_span, 7);
        assert_eq!(config.sync_option, SyncOption::DontSync);
        assert_eq!(config.bootstrap_span, 50);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(PcesConfig::new().span_overlap_factor(1.0).validate().is_err());
        assert!(PcesConfig::new().preferred_file_size_megabytes(0.0).validate().is_err());
        assert!(PcesConfig::new()
            .span_utilization_running_average_length(0)
            .validate()
            .is_err());
        assert!(PcesConfig::new().max_event_replay_frequency(0).validate().is_err());
        assert!(PcesConfig::new().minimum_span(-1).validate().is_err());
    }

    #[test]
    fn reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pces.json");
        std::fs::write(&path, r#"{"writer_type": "random_access", "permit_gaps": true}"#).unwrap();

        let config = PcesConfig::from_json_file(&path).unwrap();
        assert_eq!(config.writer_type, WriterKind::RandomAccess);
        assert!(config.permit_gaps);
    }

    #[test]
    fn sync_option_parses() {
        assert_eq!("every_event".parse::<SyncOption>().unwrap(), SyncOption::EveryEvent);
        assert!("sometimes".parse::<SyncOption>().is_err());
    }
}
