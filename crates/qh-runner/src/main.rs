//! # qh-runner
//!
//! Main entry point for the market-data replayer.
//!
//! Loads a JSON configuration file, constructs the replay coordinator, and
//! replays day after day until the requested count is reached or the source
//! data runs out.
//!
//! # Usage
//!
//! ```bash
//! qh-runner config.json --days 29 --log-level info
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use qh_core::error::ReplayError;
use tracing::{error, info};

/// Offline order-book and trades replayer.
#[derive(Parser)]
#[command(name = "qh-runner", about = "Offline order-book and trades replayer")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Number of days to replay (all remaining if omitted).
    #[arg(short, long)]
    days: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    qh_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "qh-runner");

    info!("qh-runner starting — config={}, log_level={}", cli.config.display(), cli.log_level,);

    let config = qh_core::config::load_config(&cli.config)?;
    info!(
        "config loaded — source={}, exchange={}, freq={}ms, {} worker(s)",
        config.source_dir, config.exchange_id, config.frequency_ms, config.max_workers,
    );

    let mut replayer = qh_replay::Replayer::new(config)?;
    let days = cli.days.unwrap_or(usize::MAX);

    let mut replayed = 0usize;
    while replayed < days {
        match replayer.compute_day().await {
            Ok(date) => {
                replayed += 1;
                info!("day {replayed} done ({date}), {} remaining", replayer.dates_remaining(),);
            }
            Err(ReplayError::DataExhausted) => {
                info!("source data exhausted after {replayed} day(s)");
                break;
            }
            Err(e) => {
                error!("day failed: {e}");
                return Err(e.into());
            }
        }
    }

    info!("replayed {replayed} day(s) — goodbye");
    Ok(())
}
