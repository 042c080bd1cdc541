//! Output CSV layout and row serialization.
//!
//! One file per instrument. The header is written once when the universe is
//! initialized; every replayed day appends one row per grid tick.

use std::io::Write;

use qh_core::error::Result;
use qh_core::time_util::format_us;
use qh_core::types::{MissingValuePolicy, NUM_LAYERS, SNAPSHOT_LEVELS, Value};

/// Build the header: per-layer ladder blocks, the OHLCVA block, the emitted
/// feature names, and the trailing timestamp.
pub fn csv_header(feature_names: &[&str]) -> String {
    let mut cols: Vec<String> = Vec::new();
    for layer in 0..NUM_LAYERS {
        for kind in ["bid_price", "bid_qty", "ask_price", "ask_qty"] {
            for level in 0..SNAPSHOT_LEVELS {
                cols.push(format!("layer_{layer}_{kind}_{level}"));
            }
        }
    }
    cols.extend(["open", "high", "low", "close", "volume", "amount"].map(String::from));
    cols.extend(feature_names.iter().map(|name| name.to_string()));
    cols.push("timestamp".into());
    cols.join(",")
}

/// Append one data row, missing values rendered per `missing`.
pub fn write_row<W: Write>(
    out: &mut W,
    data: &[Value],
    ts_us: i64,
    missing: MissingValuePolicy,
) -> Result<()> {
    for value in data {
        match value {
            Some(x) => write!(out, "{x},")?,
            None => write!(out, "{},", missing.missing_str())?,
        }
    }
    writeln!(out, "{}", format_us(ts_us))?;
    Ok(())
}
