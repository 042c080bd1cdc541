//! Per-interval trade aggregation.
//!
//! A [`TradesHandler`] buffers the trades of the current grid interval and, on
//! each tick, collapses them into one OHLCVA tuple. Empty intervals carry the
//! previous close with zero volume and amount, so the output stays dense.

use qh_core::types::Value;

/// Prices and quantities are rounded to 5 decimals on ingestion.
#[inline]
fn round5(x: f64) -> f64 {
    (x * 1e5).round() / 1e5
}

/// Trade-side state for a single instrument.
#[derive(Debug, Clone)]
pub struct TradesHandler {
    code: String,
    recent_trade_prices: Vec<f64>,
    recent_trade_volumes: Vec<f64>,
    prev_open: Value,
    prev_high: Value,
    prev_low: Value,
    prev_close: Value,
    vwap: Value,
}

impl TradesHandler {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            recent_trade_prices: Vec::new(),
            recent_trade_volumes: Vec::new(),
            prev_open: None,
            prev_high: None,
            prev_low: None,
            prev_close: None,
            vwap: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Ingest one trade. Rows without a price are ignored (session sentinels
    /// and empty upsampled slots); a missing quantity counts as zero.
    pub fn handle_trades(&mut self, price: Value, qty: Value) {
        let Some(price) = price else { return };
        self.recent_trade_prices.push(round5(price));
        self.recent_trade_volumes.push(round5(qty.unwrap_or(0.0)));
    }

    /// Collapse the current interval into `(open, high, low, close, volume,
    /// amount)` and clear the interval buffers.
    ///
    /// Called exactly once per grid tick. An empty interval yields
    /// `(prev_close, prev_close, prev_close, prev_close, 0, 0)` — all missing
    /// before the first trade of the very first day.
    pub fn get_ohlcva(&mut self) -> [Value; 6] {
        if self.recent_trade_prices.is_empty() {
            return [
                self.prev_close,
                self.prev_close,
                self.prev_close,
                self.prev_close,
                Some(0.0),
                Some(0.0),
            ];
        }

        let prices = &self.recent_trade_prices;
        let open = prices[0];
        let close = prices[prices.len() - 1];
        let high = prices.iter().copied().fold(f64::MIN, f64::max);
        let low = prices.iter().copied().fold(f64::MAX, f64::min);
        let volume: f64 = self.recent_trade_volumes.iter().sum();
        let amount: f64 = prices
            .iter()
            .zip(&self.recent_trade_volumes)
            .map(|(p, v)| p * v)
            .sum();

        self.prev_open = Some(open);
        self.prev_high = Some(high);
        self.prev_low = Some(low);
        self.prev_close = Some(close);
        if volume != 0.0 {
            self.vwap = Some(amount / volume);
        }
        self.recent_trade_prices.clear();
        self.recent_trade_volumes.clear();

        [Some(open), Some(high), Some(low), Some(close), Some(volume), Some(amount)]
    }

    /// Volume-weighted average price of the last non-empty interval.
    ///
    /// Not part of the OHLCVA tuple; read separately by the feature set.
    pub fn vwap(&self) -> Value {
        self.vwap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_empty_interval_is_all_missing_with_zero_volume() {
        let mut handler = TradesHandler::new("648646240");
        assert_eq!(
            handler.get_ohlcva(),
            [None, None, None, None, Some(0.0), Some(0.0)]
        );
        assert_eq!(handler.vwap(), None);
    }

    #[test]
    fn interval_aggregates_ohlcva_and_vwap() {
        let mut handler = TradesHandler::new("648646240");
        handler.handle_trades(Some(101.0), Some(1.0));
        handler.handle_trades(Some(102.0), Some(2.0));
        handler.handle_trades(Some(100.0), Some(1.0));
        let [open, high, low, close, volume, amount] = handler.get_ohlcva();
        assert_eq!(open, Some(101.0));
        assert_eq!(high, Some(102.0));
        assert_eq!(low, Some(100.0));
        assert_eq!(close, Some(100.0));
        assert_eq!(volume, Some(4.0));
        assert_eq!(amount, Some(405.0));
        assert_eq!(handler.vwap(), Some(101.25));
    }

    #[test]
    fn empty_interval_carries_previous_close() {
        let mut handler = TradesHandler::new("648646240");
        handler.handle_trades(Some(100.0), Some(2.0));
        handler.get_ohlcva();
        assert_eq!(
            handler.get_ohlcva(),
            [Some(100.0), Some(100.0), Some(100.0), Some(100.0), Some(0.0), Some(0.0)]
        );
        // VWAP keeps the last non-empty interval's value.
        assert_eq!(handler.vwap(), Some(100.0));
    }

    #[test]
    fn missing_price_rows_are_ignored() {
        let mut handler = TradesHandler::new("648646240");
        handler.handle_trades(None, Some(5.0));
        assert_eq!(handler.get_ohlcva()[4], Some(0.0));
        handler.handle_trades(Some(99.0), None);
        let [open, .., volume, amount] = handler.get_ohlcva();
        assert_eq!(open, Some(99.0));
        assert_eq!(volume, Some(0.0));
        assert_eq!(amount, Some(0.0));
    }

    #[test]
    fn prices_round_to_five_decimals() {
        let mut handler = TradesHandler::new("648646240");
        handler.handle_trades(Some(100.000004), Some(1.000004));
        let [open, .., volume, _] = handler.get_ohlcva();
        assert_eq!(open, Some(100.0));
        assert_eq!(volume, Some(1.0));
    }

    #[test]
    fn high_low_bracket_open_and_close() {
        let mut handler = TradesHandler::new("648646240");
        for &(p, q) in &[(104.5, 1.0), (103.0, 2.0), (106.25, 1.5), (105.0, 0.5)] {
            handler.handle_trades(Some(p), Some(q));
        }
        let [open, high, low, close, ..] = handler.get_ohlcva();
        let (open, high, low, close) =
            (open.unwrap(), high.unwrap(), low.unwrap(), close.unwrap());
        assert!(high >= open && high >= close && high >= low);
        assert!(low <= open && low <= close);
    }
}
