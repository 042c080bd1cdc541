//! Classification and application of raw L2 rows.
//!
//! Dispatch priority per message: OverlapRefresh (either side's change
//! indicator present) → DeltaRefresh (action code present) → MaxVisibleDepth.
//! Rows carrying none of the three are ignored (session sentinels).

use qh_core::error::{ReplayError, Result};
use qh_core::types::{
    BookUpdate, DeltaAction, DeltaRefresh, OverlapRefresh, RawL2Record, SideRefresh,
};

use crate::ladder::LocalOrderBook;

/// Limits applied by a both-sides-full overlap refresh, handed to the
/// consistency checker.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedRefresh {
    pub bid_limits: Vec<(f64, f64)>,
    pub ask_limits: Vec<(f64, f64)>,
}

/// Decode the signed change indicator of one overlap side.
///
/// Negative values mean a full refresh starting at `-ind - 1`; non-negative
/// values mean a partial refresh starting at `ind`.
pub fn decode_change_indicator(ind: i64) -> (bool, usize) {
    if ind < 0 {
        (true, (-ind - 1) as usize)
    } else {
        (false, ind as usize)
    }
}

/// Parse a concatenated limits string such as `[100.0,5][99.0,3]`.
///
/// The feed omits separators between pairs; commas are re-inserted between
/// `][` and the whole string wrapped in brackets before JSON parsing.
pub fn parse_limits(raw: &str) -> Result<Vec<(f64, f64)>> {
    let json = format!("[{}]", raw.replace("][", "],["));
    let pairs: Vec<[f64; 2]> = serde_json::from_str(&json)
        .map_err(|e| ReplayError::Schema(format!("unparseable limits string '{raw}': {e}")))?;
    Ok(pairs.into_iter().map(|[price, qty]| (price, qty)).collect())
}

fn decode_side(indicator: Option<i64>, limits: Option<&str>) -> Result<Option<SideRefresh>> {
    let Some(raw) = limits else {
        return Ok(None);
    };
    let Some(ind) = indicator else {
        return Err(ReplayError::Schema(
            "overlap limits without a change indicator".into(),
        ));
    };
    let (is_full, start_level) = decode_change_indicator(ind);
    Ok(Some(SideRefresh { is_full, start_level, limits: parse_limits(raw)? }))
}

fn decode_delta(rec: &RawL2Record, action_raw: &str) -> Result<DeltaRefresh> {
    let code: f64 = fast_float2::parse(action_raw).map_err(|_| {
        ReplayError::Schema(format!("unparseable DeltaAction '{action_raw}'"))
    })?;
    let action = DeltaAction::from_code(code as u8)
        .ok_or_else(|| ReplayError::Schema(format!("unknown DeltaAction code {code}")))?;
    let level = rec
        .level
        .ok_or_else(|| ReplayError::Schema("DeltaRefresh row without Level".into()))?
        as usize;
    if rec.price.is_none()
        && matches!(
            action,
            DeltaAction::BidInsertAtLevel
                | DeltaAction::AskInsertAtLevel
                | DeltaAction::BidRemoveLevelAndAppend
                | DeltaAction::AskRemoveLevelAndAppend
        )
    {
        return Err(ReplayError::Schema(format!("{action:?} row without Price")));
    }
    Ok(DeltaRefresh { action, level, price: rec.price, qty: rec.cumulated_units })
}

/// Classify a raw L2 row into a [`BookUpdate`].
///
/// Returns `Ok(None)` for rows that carry no update payload.
pub fn decode(rec: &RawL2Record) -> Result<Option<BookUpdate>> {
    if rec.bid_change_indicator.is_some() || rec.ask_change_indicator.is_some() {
        let refresh = OverlapRefresh {
            bid: decode_side(rec.bid_change_indicator, rec.bid_limits.as_deref())?,
            ask: decode_side(rec.ask_change_indicator, rec.ask_limits.as_deref())?,
        };
        return Ok(Some(BookUpdate::Overlap(refresh)));
    }
    if let Some(action_raw) = rec.delta_action.as_deref() {
        return Ok(Some(BookUpdate::Delta(decode_delta(rec, action_raw)?)));
    }
    if let Some(depth) = rec.max_visible_depth {
        return Ok(Some(BookUpdate::MaxVisibleDepth(depth as usize)));
    }
    Ok(None)
}

/// Apply a decoded update to a book.
///
/// Returns the applied limits when the update was a both-sides-full overlap
/// refresh, so the caller can run a consistency check against them.
pub fn apply(book: &mut LocalOrderBook, update: BookUpdate) -> Result<Option<AppliedRefresh>> {
    match update {
        BookUpdate::Overlap(refresh) => {
            let both_full = refresh.is_both_sides_full();
            let OverlapRefresh { bid, ask } = refresh;

            let bid_limits = match bid {
                Some(side) => {
                    let start = if book.best_bid_price().is_none() { 0 } else { side.start_level };
                    for (i, &(price, qty)) in side.limits.iter().enumerate() {
                        book.bid_overwrite_level(Some(price), Some(qty), start + i)?;
                    }
                    if side.is_full {
                        book.bid_clear_from_level(start + side.limits.len());
                    }
                    side.limits
                }
                None => Vec::new(),
            };
            let ask_limits = match ask {
                Some(side) => {
                    let start = if book.best_ask_price().is_none() { 0 } else { side.start_level };
                    for (i, &(price, qty)) in side.limits.iter().enumerate() {
                        book.ask_overwrite_level(Some(price), Some(qty), start + i)?;
                    }
                    if side.is_full {
                        book.ask_clear_from_level(start + side.limits.len());
                    }
                    side.limits
                }
                None => Vec::new(),
            };

            Ok(both_full.then_some(AppliedRefresh { bid_limits, ask_limits }))
        }
        BookUpdate::Delta(delta) => {
            let DeltaRefresh { action, level, price, qty } = delta;
            match action {
                DeltaAction::AllClearFromLevel => book.all_clear_from_level(level),
                DeltaAction::BidClearFromLevel => book.bid_clear_from_level(level),
                DeltaAction::AskClearFromLevel => book.ask_clear_from_level(level),
                DeltaAction::BidInsertAtLevel => book.bid_insert_at_level(level, price, qty)?,
                DeltaAction::AskInsertAtLevel => book.ask_insert_at_level(level, price, qty)?,
                DeltaAction::BidRemoveLevel => book.bid_remove_level(level)?,
                DeltaAction::AskRemoveLevel => book.ask_remove_level(level)?,
                DeltaAction::BidChangeQtyAtLevel => book.bid_change_qty_at_level(level, qty)?,
                DeltaAction::AskChangeQtyAtLevel => book.ask_change_qty_at_level(level, qty)?,
                DeltaAction::BidRemoveLevelAndAppend => {
                    book.bid_remove_level_and_append(level, price, qty)?;
                }
                DeltaAction::AskRemoveLevelAndAppend => {
                    book.ask_remove_level_and_append(level, price, qty)?;
                }
            }
            Ok(None)
        }
        BookUpdate::MaxVisibleDepth(depth) => {
            book.max_visible_depth(depth);
            Ok(None)
        }
    }
}
