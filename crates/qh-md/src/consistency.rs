//! Verification of incremental book state against full refreshes.
//!
//! Whenever a single message re-sends both sides in full, the book built from
//! increments must agree with the re-sent limits. Disagreement is not fatal —
//! it is recorded and summarized as a per-day accuracy ratio.

use tracing::warn;

use qh_core::time_util::format_us;

use crate::ladder::LocalOrderBook;

/// Price/volume tolerance when comparing ladder slots against limits.
const TOLERANCE: f64 = 1e-3;

/// Accumulates consistency-check outcomes for one instrument-day.
#[derive(Debug, Default)]
pub struct ConsistencyChecker {
    checks: u64,
    consistent: u64,
}

/// Scan one side's ladder against its limits; first offending level, if any.
///
/// A slot where either operand is missing cannot establish a mismatch and is
/// skipped (missing compares equal to anything, as NaN does).
fn first_mismatch(
    limits: &[(f64, f64)],
    price_at: impl Fn(usize) -> Option<f64>,
    volume_at: impl Fn(usize) -> Option<f64>,
) -> Option<usize> {
    for (level, &(price, qty)) in limits.iter().enumerate() {
        let price_diff = price_at(level).map(|p| (p - price).abs());
        let volume_diff = volume_at(level).map(|v| (v - qty).abs());
        if price_diff.is_some_and(|d| d > TOLERANCE) || volume_diff.is_some_and(|d| d > TOLERANCE)
        {
            return Some(level);
        }
    }
    None
}

impl ConsistencyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the book's ladders against the limits of a both-sides-full
    /// overlap refresh. Each side is scanned independently up to its own
    /// limits length; scanning stops at the first mismatch.
    ///
    /// Returns `true` when consistent; a mismatch is logged with full context.
    pub fn verify(
        &mut self,
        book: &LocalOrderBook,
        bid_limits: &[(f64, f64)],
        ask_limits: &[(f64, f64)],
        ts_us: i64,
    ) -> bool {
        self.checks += 1;

        let mismatch = first_mismatch(bid_limits, |l| book.bid_price_at(l), |l| {
            book.bid_volume_at(l)
        })
        .map(|level| ("bid", level))
        .or_else(|| {
            first_mismatch(ask_limits, |l| book.ask_price_at(l), |l| book.ask_volume_at(l))
                .map(|level| ("ask", level))
        });

        match mismatch {
            None => {
                self.consistent += 1;
                true
            }
            Some((side, level)) => {
                warn!(
                    "book mismatch at {} ({} level {}): bid_limits={:?} ask_limits={:?}\n{}",
                    format_us(ts_us),
                    side,
                    level,
                    bid_limits,
                    ask_limits,
                    book,
                );
                false
            }
        }
    }

    /// Checks performed so far.
    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Fraction of consistent checks, or `None` if no check occurred.
    pub fn accuracy(&self) -> Option<f64> {
        if self.checks == 0 {
            None
        } else {
            Some(self.consistent as f64 / self.checks as f64)
        }
    }
}
