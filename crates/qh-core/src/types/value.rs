//! Missing-value representation.
//!
//! The source feed mixes host-nulls and NaN; here a single representation is
//! used everywhere: [`Value`] (`Option<f64>`), `None` meaning missing. Ladder
//! slots, OHLCVA fields, VWAP, feature outputs, and carry-over rows all use
//! it. Arithmetic on values mirrors IEEE-NaN propagation: a missing operand
//! makes the result missing, and ordered comparisons against missing are
//! false.

use serde::Deserialize;

/// A possibly-missing float. `None` is the ladder / output missing sentinel.
pub type Value = Option<f64>;

/// Levels per side emitted in a snapshot row.
pub const SNAPSHOT_LEVELS: usize = 10;

/// Orthogonal book planes per instrument (layer ids 0..=5).
pub const NUM_LAYERS: usize = 6;

/// Values contributed by one layer: bid prices, bid volumes, ask prices,
/// ask volumes, [`SNAPSHOT_LEVELS`] each.
pub const LAYER_WIDTH: usize = 4 * SNAPSHOT_LEVELS;

/// Values in the OHLCVA block appended after the ladder blocks.
pub const OHLCVA_WIDTH: usize = 6;

/// How missing values are rendered in output CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// Write `NaN` (what the reference output contains).
    #[default]
    Nan,
    /// Write an empty field.
    Empty,
}

impl MissingValuePolicy {
    /// The literal written for a missing value.
    pub fn missing_str(self) -> &'static str {
        match self {
            MissingValuePolicy::Nan => "NaN",
            MissingValuePolicy::Empty => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_deserializes_lowercase() {
        let p: MissingValuePolicy = serde_json::from_str("\"empty\"").unwrap();
        assert_eq!(p, MissingValuePolicy::Empty);
        let p: MissingValuePolicy = serde_json::from_str("\"nan\"").unwrap();
        assert_eq!(p.missing_str(), "NaN");
    }
}
