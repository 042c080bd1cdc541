//! Raw input rows, one struct per feed file kind.
//!
//! Field names map 1:1 to the CSV column headers of the exchange dumps; all
//! payload columns are nullable (empty CSV fields deserialize to `None`).
//! Extra columns in the files are ignored.

use serde::Deserialize;

/// Instrument code of server-side session boundary rows.
pub const BLANK_CODE: &str = "blank";

/// One row of a `*_L2.csv.gz` book update file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawL2Record {
    #[serde(rename = "Code")]
    pub code: String,

    /// Book plane this update addresses (0..=5). Null rows are skipped.
    #[serde(rename = "LayerId")]
    pub layer_id: Option<i64>,

    #[serde(rename = "DeltaRefresh_ServerTimestamp")]
    pub delta_server_timestamp: Option<String>,

    #[serde(rename = "OverlapRefresh_ServerTimestamp")]
    pub overlap_server_timestamp: Option<String>,

    /// Signed change indicator; negative means full refresh.
    #[serde(rename = "OverlapRefresh_BidChangeIndicator")]
    pub bid_change_indicator: Option<i64>,

    #[serde(rename = "OverlapRefresh_AskChangeIndicator")]
    pub ask_change_indicator: Option<i64>,

    /// Concatenated `[price,qty]` pairs, e.g. `[100.0,5][99.0,3]`.
    #[serde(rename = "OverlapRefresh_BidLimits")]
    pub bid_limits: Option<String>,

    #[serde(rename = "OverlapRefresh_AskLimits")]
    pub ask_limits: Option<String>,

    #[serde(rename = "MaxVisibleDepth_MaxVisibleDepth")]
    pub max_visible_depth: Option<f64>,

    /// Stringified float action code, `"0.0"` .. `"10.0"`.
    #[serde(rename = "DeltaRefresh_DeltaAction")]
    pub delta_action: Option<String>,

    #[serde(rename = "DeltaRefresh_CumulatedUnits")]
    pub cumulated_units: Option<f64>,

    #[serde(rename = "DeltaRefresh_Level")]
    pub level: Option<f64>,

    #[serde(rename = "DeltaRefresh_Price")]
    pub price: Option<f64>,
}

impl RawL2Record {
    /// Synthetic sentinel row for `code` — all payload columns null.
    pub fn blank(code: &str) -> Self {
        Self { code: code.to_string(), ..Self::default() }
    }
}

/// One row of a `*_L1-Trades.csv.gz` trade file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawL1Record {
    #[serde(rename = "Code")]
    pub code: String,

    #[serde(rename = "ServerTimestamp")]
    pub server_timestamp: Option<String>,

    #[serde(rename = "TradeEvent_LastPrice")]
    pub last_price: Option<f64>,

    #[serde(rename = "TradeEvent_LastTradeQuantity")]
    pub last_trade_quantity: Option<f64>,
}

impl RawL1Record {
    /// Synthetic sentinel row for `code` — all payload columns null.
    pub fn blank(code: &str) -> Self {
        Self { code: code.to_string(), ..Self::default() }
    }
}
