//! Configuration parsing for the replay pipeline.
//!
//! All knobs live in a single JSON config file; the CLI only selects the file
//! and the logging options.
//!
//! # Example config
//!
//! ```json
//! {
//!   "source_dir": "/storage/quanthouse/one-mon/cme",
//!   "exchange_id": "1027",
//!   "destination_dir": "/data/replay-out",
//!   "start_date": "2018-12-01",
//!   "frequency_ms": 1000,
//!   "universe": ["648646240", "648469957"],
//!   "max_workers": 8,
//!   "missing_value": "nan"
//! }
//! ```

use serde::Deserialize;

use crate::error::{ReplayError, Result};
use crate::time_util::{self, US_PER_MS};
use crate::types::MissingValuePolicy;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Directory containing `l2_data/` and `l1_data/`.
    pub source_dir: String,

    /// Exchange identifier — the `<eid>` component of the input file names.
    pub exchange_id: String,

    /// Output directory, one CSV per instrument. Created if absent.
    pub destination_dir: String,

    /// First date to replay, `YYYY-MM-DD`. Earlier files are skipped.
    pub start_date: String,

    /// Grid period in milliseconds.
    #[serde(default = "default_frequency_ms")]
    pub frequency_ms: u64,

    /// Instrument codes to replay. Empty means: infer from the first day's
    /// L2 data (all codes except the `"blank"` sentinel).
    #[serde(default)]
    pub universe: Vec<String>,

    /// Buffer capacity of each output file stream, in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Number of parallel replay workers per day.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Hours the session opens *before* UTC midnight of the trading date.
    #[serde(default = "default_session_offset_hours")]
    pub session_offset_hours: i64,

    /// Ladder capacity of a freshly created order book.
    #[serde(default = "default_initial_levels")]
    pub initial_levels: usize,

    /// How missing values are written to output CSV.
    #[serde(default)]
    pub missing_value: MissingValuePolicy,

    /// Optional CPU core list; worker `i` is pinned to `cpu_affinity[i % len]`.
    #[serde(default)]
    pub cpu_affinity: Option<Vec<i32>>,
}

fn default_frequency_ms() -> u64 {
    100
}

fn default_buffer_size() -> usize {
    1 << 20
}

fn default_max_workers() -> usize {
    2
}

fn default_session_offset_hours() -> i64 {
    2
}

fn default_initial_levels() -> usize {
    15
}

impl ReplayConfig {
    /// Grid period in microseconds.
    pub fn frequency_us(&self) -> i64 {
        self.frequency_ms as i64 * US_PER_MS
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.frequency_ms == 0 {
            return Err(ReplayError::Config("frequency_ms must be positive".into()));
        }
        if self.max_workers == 0 {
            return Err(ReplayError::Config("max_workers must be positive".into()));
        }
        if self.initial_levels == 0 {
            return Err(ReplayError::Config("initial_levels must be positive".into()));
        }
        if time_util::parse_date(&self.start_date).is_none() {
            return Err(ReplayError::Config(format!(
                "start_date '{}' is not YYYY-MM-DD",
                self.start_date
            )));
        }
        Ok(())
    }
}

/// Load and validate a [`ReplayConfig`] from a JSON file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<ReplayConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ReplayConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: ReplayConfig = serde_json::from_str(
            r#"{
                "source_dir": "/data/cme",
                "exchange_id": "1027",
                "destination_dir": "/tmp/out",
                "start_date": "2018-12-01"
            }"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.frequency_ms, 100);
        assert_eq!(config.frequency_us(), 100_000);
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.session_offset_hours, 2);
        assert_eq!(config.initial_levels, 15);
        assert!(config.universe.is_empty());
        assert_eq!(config.buffer_size, 1 << 20);
    }

    #[test]
    fn bad_start_date_rejected() {
        let config: ReplayConfig = serde_json::from_str(
            r#"{
                "source_dir": "/data/cme",
                "exchange_id": "1027",
                "destination_dir": "/tmp/out",
                "start_date": "12/01/2018"
            }"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
