//! Offline rewrite of a stream against a saved state.
//!
//! A state that was not taken at a freeze point may be older than events
//! already in the stream. [`filter_stream`] copies the stream into a new
//! directory, dropping every event born after the state's round, so the pair
//! looks like a freeze state to a node that loads it.
//!
//! The output is assembled in a staging directory next to the destination and
//! renamed into place only once complete. A failure never leaves a partial
//! output directory behind.

use crate::clock::Time;
use crate::config::PcesConfig;
use crate::error::{CoreError, CoreResult};
use crate::manager::SegmentManager;
use crate::metrics::PcesMetrics;
use crate::segment::{scan_segments, PcesEventIterator};
use crate::types::EventWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the saved-state metadata inside a state directory.
pub const STATE_METADATA_FILE: &str = "stateMetadata.json";

const STAGING_EXTENSION: &str = "filtering";

/// The parts of a saved state's metadata the filter needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedStateMetadata {
    /// Round of the state.
    pub round: i64,
    /// Lowest birth round that is not ancient in the state.
    pub minimum_birth_round_non_ancient: i64,
    /// Consensus time of the state.
    pub consensus_timestamp: DateTime<Utc>,
    /// Whether the state was taken at a freeze.
    #[serde(default)]
    pub freeze_state: Option<bool>,
}

impl SavedStateMetadata {
    /// Reads `stateMetadata.json` from `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(state_dir: &Path) -> CoreResult<Self> {
        let text = fs::read_to_string(state_dir.join(STATE_METADATA_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes `stateMetadata.json` into `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, state_dir: &Path) -> CoreResult<()> {
        fs::create_dir_all(state_dir)?;
        let text = serde_json::to_string_pretty(self)?;
        fs::write(state_dir.join(STATE_METADATA_FILE), text)?;
        Ok(())
    }
}

/// Counts from a completed filter run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    /// Events copied to the output.
    pub kept: u64,
    /// Events dropped for being born after the state's round.
    pub discarded: u64,
    /// Segments in the output.
    pub segments_written: usize,
}

/// Copies the stream in `input_dir` to `output_dir`, dropping events born
/// after the round of the state in `state_dir`.
///
/// The input is only read. Events below the state's non-ancient boundary
/// are not copied, since a node loading the state would never replay them.
/// The output carries the state's round as its origin.
///
/// # Errors
///
/// Returns an error if the metadata cannot be read, `output_dir` already
/// exists and is not empty, or on any read or write failure. In every error
/// case `output_dir` is left as it was.
pub fn filter_stream(
    config: &PcesConfig,
    input_dir: &Path,
    state_dir: &Path,
    output_dir: &Path,
    time: Arc<dyn Time>,
    metrics: Arc<PcesMetrics>,
) -> CoreResult<FilterOutcome> {
    let metadata = SavedStateMetadata::load(state_dir)?;
    ensure_output_available(output_dir)?;

    if metadata.freeze_state == Some(true) {
        info!(round = metadata.round, "state is a freeze state; no future events expected");
    }

    let staging = staging_dir(output_dir);
    if staging.exists() {
        warn!(staging = %staging.display(), "removing stale staging directory");
        fs::remove_dir_all(&staging)?;
    }

    let outcome = match write_filtered(config, input_dir, &staging, &metadata, time, metrics) {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    if output_dir.exists() {
        fs::remove_dir(output_dir)?;
    }
    if !staging.exists() {
        fs::create_dir_all(&staging)?;
    }
    fs::rename(&staging, output_dir)?;

    info!(
        round = metadata.round,
        kept = outcome.kept,
        discarded = outcome.discarded,
        segments = outcome.segments_written,
        output = %output_dir.display(),
        "filtered preconsensus event stream; {} events were discarded due to being from a future round",
        outcome.discarded
    );
    Ok(outcome)
}

fn write_filtered(
    config: &PcesConfig,
    input_dir: &Path,
    staging: &Path,
    metadata: &SavedStateMetadata,
    time: Arc<dyn Time>,
    metrics: Arc<PcesMetrics>,
) -> CoreResult<FilterOutcome> {
    let input = scan_segments(input_dir, config.permit_gaps)?;
    let relevant = input.relevant_segments(metadata.round);
    let skipped = input.len() - relevant.len();
    if skipped > 0 {
        debug!(skipped, round = metadata.round, "ignoring segments outside the state's lineage");
    }
    let lower_bound = metadata.minimum_birth_round_non_ancient;

    let mut output = SegmentManager::open(config.clone(), staging, metadata.round, time, metrics)?;
    output.begin_streaming_new_events();
    output.update_non_ancient_event_boundary(&EventWindow::new(metadata.round, lower_bound))?;

    let mut outcome = FilterOutcome::default();
    for event in PcesEventIterator::new(relevant, lower_bound) {
        let event = event?;
        if event.birth_round() > metadata.round {
            outcome.discarded += 1;
            continue;
        }
        output.prepare_output_stream(&event)?;
        output.write_event(&event)?;
        outcome.kept += 1;
    }
    output.close_current_segment()?;

    outcome.segments_written = output.tracker().len();
    Ok(outcome)
}

fn ensure_output_available(output_dir: &Path) -> CoreResult<()> {
    if !output_dir.exists() {
        return Ok(());
    }
    if !output_dir.is_dir() || fs::read_dir(output_dir)?.next().is_some() {
        return Err(CoreError::illegal_argument(format!(
            "output directory {} already exists and is not empty",
            output_dir.display()
        )));
    }
    Ok(())
}

fn staging_dir(output_dir: &Path) -> PathBuf {
    output_dir.with_extension(STAGING_EXTENSION)
}
