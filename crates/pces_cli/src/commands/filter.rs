//! Filter command implementation.

use pces_core::{filter_stream, PcesConfig, PcesMetrics, SystemClock};
use std::path::Path;
use std::sync::Arc;

/// Runs the filter command.
pub fn run(
    input: &Path,
    config: &PcesConfig,
    state: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.is_dir() {
        return Err(format!("No stream found at {}", input.display()).into());
    }

    let outcome = filter_stream(
        config,
        input,
        state,
        output,
        Arc::new(SystemClock),
        Arc::new(PcesMetrics::new()),
    )?;

    println!("Filtered stream written to {}", output.display());
    println!("  Events kept:      {}", outcome.kept);
    println!("  Events discarded: {}", outcome.discarded);
    println!("  Segments written: {}", outcome.segments_written);
    println!(
        "{} events were discarded due to being from a future round.",
        outcome.discarded
    );

    Ok(())
}
