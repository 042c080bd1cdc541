//! Microstructure features evaluated at every grid tick.
//!
//! A feature is a pure function over the current tick's assembled row
//! (`data`), the previous tick's row (`prev`), and the rolling VWAP. Features
//! read the first book layer of the row: bid prices at `[0..10)`, bid volumes
//! at `[10..20)`, ask prices at `[20..30)`, ask volumes at `[30..40)`.
//!
//! Missing values follow NaN semantics: any missing operand makes the feature
//! missing, and ordered comparisons against missing are false.

use qh_core::types::{SNAPSHOT_LEVELS, Value};

/// Book levels a feature looks at.
const LEVELS: usize = 5;

/// Per-level weights, best level heaviest.
const WEIGHTS: [f64; LEVELS] = [1.0, 0.8, 0.6, 0.4, 0.2];
const WEIGHT_SUM: f64 = 3.0;
const WEIGHT_CUMSUM: [f64; LEVELS] = [1.0, 1.8, 2.4, 2.8, 3.0];

#[inline]
fn nan(v: Value) -> f64 {
    v.unwrap_or(f64::NAN)
}

#[inline]
fn to_value(x: f64) -> Value {
    if x.is_nan() { None } else { Some(x) }
}

#[inline]
fn bid_price(row: &[Value], level: usize) -> f64 {
    nan(row.get(level).copied().flatten())
}

#[inline]
fn bid_volume(row: &[Value], level: usize) -> f64 {
    nan(row.get(SNAPSHOT_LEVELS + level).copied().flatten())
}

#[inline]
fn ask_price(row: &[Value], level: usize) -> f64 {
    nan(row.get(2 * SNAPSHOT_LEVELS + level).copied().flatten())
}

#[inline]
fn ask_volume(row: &[Value], level: usize) -> f64 {
    nan(row.get(3 * SNAPSHOT_LEVELS + level).copied().flatten())
}

// ---------------------------------------------------------------------------
// Feature trait + registry
// ---------------------------------------------------------------------------

/// A stateless per-tick feature.
pub trait Feature: Send {
    /// Column name in the output header.
    fn name(&self) -> &'static str;

    /// Whether the computed value is appended to the output row.
    fn emit(&self) -> bool {
        true
    }

    /// Evaluate over the current row, the previous row, and the VWAP.
    fn compute(&self, data: &[Value], prev: Option<&[Value]>, vwap: Value) -> Value;
}

/// The standard feature set, in output-column order.
pub fn default_features() -> Vec<Box<dyn Feature>> {
    vec![
        Box::new(OrderImbalanceRatio),
        Box::new(MidPriceBasis),
        Box::new(VolumeOrderImbalance),
    ]
}

// ---------------------------------------------------------------------------
// oir — order imbalance ratio
// ---------------------------------------------------------------------------

/// Weighted bid/ask volume imbalance over the top [`LEVELS`] levels:
/// `(vb - va) / (vb + va)` with `v* = Σ volume·weight / Σ weight`.
pub struct OrderImbalanceRatio;

impl Feature for OrderImbalanceRatio {
    fn name(&self) -> &'static str {
        "oir"
    }

    fn compute(&self, data: &[Value], prev: Option<&[Value]>, _vwap: Value) -> Value {
        prev?;
        let mut vb = 0.0;
        let mut va = 0.0;
        for i in 0..LEVELS {
            vb += bid_volume(data, i) * WEIGHTS[i];
            va += ask_volume(data, i) * WEIGHTS[i];
        }
        vb /= WEIGHT_SUM;
        va /= WEIGHT_SUM;
        to_value((vb - va) / (vb + va))
    }
}

// ---------------------------------------------------------------------------
// mpb — mid-price basis
// ---------------------------------------------------------------------------

/// VWAP minus the average of the current and previous mid prices.
pub struct MidPriceBasis;

impl Feature for MidPriceBasis {
    fn name(&self) -> &'static str {
        "mpb"
    }

    fn compute(&self, data: &[Value], prev: Option<&[Value]>, vwap: Value) -> Value {
        let prev = prev?;
        let midp = (bid_price(data, 0) + ask_price(data, 0)) / 2.0;
        let prev_midp = (bid_price(prev, 0) + ask_price(prev, 0)) / 2.0;
        to_value(nan(vwap) - (midp + prev_midp) / 2.0)
    }
}

// ---------------------------------------------------------------------------
// voi — volume order imbalance
// ---------------------------------------------------------------------------

/// Weighted cumulative bid/ask volume deltas between consecutive ticks.
///
/// Per level: a bid price improvement contributes the full bid volume, a
/// deterioration contributes zero, an unchanged price contributes the volume
/// change; mirrored with reversed signs on the ask side. The weighted deltas
/// are cumulated across levels and averaged against the cumulative weights.
pub struct VolumeOrderImbalance;

impl Feature for VolumeOrderImbalance {
    fn name(&self) -> &'static str {
        "voi"
    }

    fn compute(&self, data: &[Value], prev: Option<&[Value]>, _vwap: Value) -> Value {
        let prev = prev?;
        let mut cum_bid = 0.0;
        let mut cum_ask = 0.0;
        let mut total = 0.0;
        for i in 0..LEVELS {
            let (bid, prev_bid) = (bid_price(data, i), bid_price(prev, i));
            let delta_bid = if bid > prev_bid {
                bid_volume(data, i)
            } else if bid < prev_bid {
                0.0
            } else {
                bid_volume(data, i) - bid_volume(prev, i)
            };

            let (ask, prev_ask) = (ask_price(data, i), ask_price(prev, i));
            let delta_ask = if ask > prev_ask {
                0.0
            } else if ask < prev_ask {
                ask_volume(data, i)
            } else {
                ask_volume(data, i) - ask_volume(prev, i)
            };

            cum_bid += delta_bid * WEIGHTS[i];
            cum_ask += delta_ask * WEIGHTS[i];
            total += (cum_bid - cum_ask) / WEIGHT_CUMSUM[i];
        }
        to_value(total)
    }
}
