//! PCES CLI
//!
//! Command-line tools for inspecting and maintaining a preconsensus event
//! stream directory.
//!
//! # Commands
//!
//! - `inspect` - List segments and stream totals
//! - `verify` - Read every segment and check its bounds
//! - `dump` - Print events for debugging
//! - `filter` - Rewrite a stream against a saved state

mod commands;

use clap::{Parser, Subcommand};
use pces_core::PcesConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Preconsensus event stream tools.
#[derive(Parser)]
#[command(name = "pces")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the stream directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// JSON file overriding stream settings
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List segments and stream totals
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read every segment and check its bounds
    Verify,

    /// Print events for debugging
    Dump {
        /// Maximum number of events to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip events with a lower ancient indicator
        #[arg(long, default_value_t = pces_core::NO_LOWER_BOUND)]
        lower_bound: i64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Copy the stream, dropping events born after a saved state's round
    Filter {
        /// Directory containing stateMetadata.json
        #[arg(short, long)]
        state: PathBuf,

        /// Directory to write the filtered stream to
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => PcesConfig::from_json_file(path)?,
        None => PcesConfig::default(),
    };

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Stream path required for inspect")?;
            commands::inspect::run(&path, &config, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Stream path required for verify")?;
            commands::verify::run(&path, &config)?;
        }
        Commands::Dump {
            limit,
            lower_bound,
            format,
        } => {
            let path = cli.path.ok_or("Stream path required for dump")?;
            commands::dump::run(&path, &config, lower_bound, limit, &format)?;
        }
        Commands::Filter { state, output } => {
            let path = cli.path.ok_or("Stream path required for filter")?;
            commands::filter::run(&path, &config, &state, &output)?;
        }
        Commands::Version => {
            println!("PCES CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("PCES Core v{}", pces_core::VERSION);
            println!("Segment format v{}", pces_storage::FORMAT_VERSION);
        }
    }

    Ok(())
}
