//! Incremental order book maintaining fixed-capacity price/volume ladders.
//!
//! The feed re-sends books as *overlap refreshes* (positional overwrites of a
//! level range) and mutates them with *delta refreshes* (insert / remove /
//! change-qty at a named level). Unlike a price-keyed book, levels here are
//! **positions**: index 0 is the best price on each side, and every operation
//! addresses a position, not a price tick.
//!
//! All four sequences (bid prices, bid volumes, ask prices, ask volumes) keep
//! identical length through every operation; empty slots hold the missing
//! sentinel (`None`).

use std::fmt;

use qh_core::error::{ReplayError, Result};
use qh_core::types::Value;

// ---------------------------------------------------------------------------
// Side — one half of the book
// ---------------------------------------------------------------------------

/// One side of the book: equal-length price and volume sequences, best first.
#[derive(Debug, Clone, PartialEq)]
struct Side {
    prices: Vec<Value>,
    volumes: Vec<Value>,
}

impl Side {
    fn new(levels: usize) -> Self {
        Self { prices: vec![None; levels], volumes: vec![None; levels] }
    }

    #[inline]
    fn len(&self) -> usize {
        self.prices.len()
    }

    #[inline]
    fn check(&self, level: usize) -> Result<()> {
        if level >= self.len() {
            return Err(ReplayError::Book(format!(
                "level {level} out of range for ladder of {} levels",
                self.len()
            )));
        }
        Ok(())
    }

    fn change_qty(&mut self, level: usize, qty: Value) -> Result<()> {
        self.check(level)?;
        self.volumes[level] = qty;
        Ok(())
    }

    /// Delete the entry at `level`, shift the tail up, append a missing slot.
    fn remove_level(&mut self, level: usize) -> Result<()> {
        self.check(level)?;
        self.prices.remove(level);
        self.volumes.remove(level);
        self.prices.push(None);
        self.volumes.push(None);
        Ok(())
    }

    /// Insert at `level`, shift the tail down, drop the last entry.
    ///
    /// `level == len` is accepted and is a no-op: the entry would land on the
    /// never-visible tail and be dropped immediately.
    fn insert_at(&mut self, level: usize, price: Value, qty: Value) -> Result<()> {
        if level > self.len() {
            return Err(ReplayError::Book(format!(
                "insert level {level} past ladder of {} levels",
                self.len()
            )));
        }
        self.prices.insert(level, price);
        self.volumes.insert(level, qty);
        self.prices.pop();
        self.volumes.pop();
        Ok(())
    }

    /// Delete the entry at `level` and append `(price, qty)` at the tail.
    fn remove_and_append(&mut self, level: usize, price: Value, qty: Value) -> Result<()> {
        self.check(level)?;
        self.prices.remove(level);
        self.volumes.remove(level);
        self.prices.push(price);
        self.volumes.push(qty);
        Ok(())
    }

    /// Set all entries from `level` to the tail to missing. No-op past the end.
    fn clear_from(&mut self, level: usize) {
        if level >= self.len() {
            return;
        }
        for slot in &mut self.prices[level..] {
            *slot = None;
        }
        for slot in &mut self.volumes[level..] {
            *slot = None;
        }
    }

    /// Write `(price, qty)` at `level` without shifting.
    fn overwrite(&mut self, level: usize, price: Value, qty: Value) -> Result<()> {
        self.check(level)?;
        self.prices[level] = price;
        self.volumes[level] = qty;
        Ok(())
    }

    /// Truncate or extend (with missing slots) to `depth` levels.
    fn resize(&mut self, depth: usize) {
        self.prices.resize(depth, None);
        self.volumes.resize(depth, None);
    }

    /// Append `levels` prices then `levels` volumes, padding with missing.
    fn snapshot_into(&self, out: &mut Vec<Value>, levels: usize) {
        out.extend((0..levels).map(|i| self.prices.get(i).copied().flatten()));
        out.extend((0..levels).map(|i| self.volumes.get(i).copied().flatten()));
    }
}

// ---------------------------------------------------------------------------
// LocalOrderBook
// ---------------------------------------------------------------------------

/// Book state for one `(instrument, layer)` pair.
///
/// Invariants after every operation:
/// - all four sequences have identical length;
/// - Insert / Remove / RemoveAndAppend preserve total length;
/// - empty slots are the missing sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalOrderBook {
    code: String,
    layer: usize,
    bid: Side,
    ask: Side,
}

impl LocalOrderBook {
    /// Create an empty book with `initial_levels` slots per side.
    pub fn new(code: &str, layer: usize, initial_levels: usize) -> Self {
        Self {
            code: code.to_string(),
            layer,
            bid: Side::new(initial_levels),
            ask: Side::new(initial_levels),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Current ladder length (identical on both sides).
    pub fn depth(&self) -> usize {
        self.bid.len()
    }

    pub fn best_bid_price(&self) -> Value {
        self.bid.prices.first().copied().flatten()
    }

    pub fn best_ask_price(&self) -> Value {
        self.ask.prices.first().copied().flatten()
    }

    pub fn bid_price_at(&self, level: usize) -> Value {
        self.bid.prices.get(level).copied().flatten()
    }

    pub fn bid_volume_at(&self, level: usize) -> Value {
        self.bid.volumes.get(level).copied().flatten()
    }

    pub fn ask_price_at(&self, level: usize) -> Value {
        self.ask.prices.get(level).copied().flatten()
    }

    pub fn ask_volume_at(&self, level: usize) -> Value {
        self.ask.volumes.get(level).copied().flatten()
    }

    // --- update primitives -------------------------------------------------

    pub fn bid_change_qty_at_level(&mut self, level: usize, qty: Value) -> Result<()> {
        self.bid.change_qty(level, qty)
    }

    pub fn ask_change_qty_at_level(&mut self, level: usize, qty: Value) -> Result<()> {
        self.ask.change_qty(level, qty)
    }

    pub fn bid_remove_level(&mut self, level: usize) -> Result<()> {
        self.bid.remove_level(level)
    }

    pub fn ask_remove_level(&mut self, level: usize) -> Result<()> {
        self.ask.remove_level(level)
    }

    pub fn bid_insert_at_level(&mut self, level: usize, price: Value, qty: Value) -> Result<()> {
        self.bid.insert_at(level, price, qty)
    }

    pub fn ask_insert_at_level(&mut self, level: usize, price: Value, qty: Value) -> Result<()> {
        self.ask.insert_at(level, price, qty)
    }

    pub fn bid_remove_level_and_append(
        &mut self,
        level: usize,
        price: Value,
        qty: Value,
    ) -> Result<()> {
        self.bid.remove_and_append(level, price, qty)
    }

    pub fn ask_remove_level_and_append(
        &mut self,
        level: usize,
        price: Value,
        qty: Value,
    ) -> Result<()> {
        self.ask.remove_and_append(level, price, qty)
    }

    pub fn bid_clear_from_level(&mut self, level: usize) {
        self.bid.clear_from(level);
    }

    pub fn ask_clear_from_level(&mut self, level: usize) {
        self.ask.clear_from(level);
    }

    /// Clear both sides from `level` to the tail.
    pub fn all_clear_from_level(&mut self, level: usize) {
        self.bid.clear_from(level);
        self.ask.clear_from(level);
    }

    pub fn bid_overwrite_level(&mut self, price: Value, qty: Value, level: usize) -> Result<()> {
        self.bid.overwrite(level, price, qty)
    }

    pub fn ask_overwrite_level(&mut self, price: Value, qty: Value, level: usize) -> Result<()> {
        self.ask.overwrite(level, price, qty)
    }

    /// Apply an exchange-advertised visible depth: truncate if shallower,
    /// extend with missing slots if deeper. Both sides resize together.
    pub fn max_visible_depth(&mut self, depth: usize) {
        if depth != self.depth() {
            self.bid.resize(depth);
            self.ask.resize(depth);
        }
    }

    // --- snapshots ---------------------------------------------------------

    /// Append the four sequences, each truncated/padded to `levels`, as
    /// `[bid_prices | bid_volumes | ask_prices | ask_volumes]`.
    pub fn snapshot_into(&self, out: &mut Vec<Value>, levels: usize) {
        self.bid.snapshot_into(out, levels);
        self.ask.snapshot_into(out, levels);
    }

    /// Owned variant of [`snapshot_into`](Self::snapshot_into).
    pub fn take_snapshot(&self, levels: usize) -> Vec<Value> {
        let mut out = Vec::with_capacity(4 * levels);
        self.snapshot_into(&mut out, levels);
        out
    }
}

impl fmt::Display for LocalOrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn row(values: &[Value]) -> String {
            values
                .iter()
                .map(|v| match v {
                    Some(x) => x.to_string(),
                    None => "NaN".to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
        writeln!(f, "instrument {} layer {}", self.code, self.layer)?;
        writeln!(f, "bid prices:  [{}]", row(&self.bid.prices))?;
        writeln!(f, "bid volumes: [{}]", row(&self.bid.volumes))?;
        writeln!(f, "ask prices:  [{}]", row(&self.ask.prices))?;
        write!(f, "ask volumes: [{}]", row(&self.ask.volumes))
    }
}
