//! Decoded book update primitives.
//!
//! A raw L2 row is classified into exactly one of three update kinds:
//! an [`OverlapRefresh`] (full or partial re-send of one or both sides),
//! a [`DeltaRefresh`] (incremental mutation at a named level), or a
//! visible-depth change. The stringified action codes of the feed are mapped
//! to [`DeltaAction`] once, at decode time.

/// Incremental book mutation kinds, by feed action code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaAction {
    AllClearFromLevel,
    BidClearFromLevel,
    AskClearFromLevel,
    BidInsertAtLevel,
    AskInsertAtLevel,
    BidRemoveLevel,
    AskRemoveLevel,
    BidChangeQtyAtLevel,
    AskChangeQtyAtLevel,
    BidRemoveLevelAndAppend,
    AskRemoveLevelAndAppend,
}

impl DeltaAction {
    /// Map a numeric feed code (0..=10) to its action.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::AllClearFromLevel,
            1 => Self::BidClearFromLevel,
            2 => Self::AskClearFromLevel,
            3 => Self::BidInsertAtLevel,
            4 => Self::AskInsertAtLevel,
            5 => Self::BidRemoveLevel,
            6 => Self::AskRemoveLevel,
            7 => Self::BidChangeQtyAtLevel,
            8 => Self::AskChangeQtyAtLevel,
            9 => Self::BidRemoveLevelAndAppend,
            10 => Self::AskRemoveLevelAndAppend,
            _ => return None,
        })
    }
}

/// One side of an overlap refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct SideRefresh {
    /// Full refresh: levels past the re-sent range are cleared.
    pub is_full: bool,
    /// Ladder level the re-sent range starts at.
    pub start_level: usize,
    /// `(price, qty)` pairs, best first.
    pub limits: Vec<(f64, f64)>,
}

/// A full or partial re-send of one or both book sides.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlapRefresh {
    pub bid: Option<SideRefresh>,
    pub ask: Option<SideRefresh>,
}

impl OverlapRefresh {
    /// True when both sides arrive as full refreshes in the same message —
    /// the trigger for a consistency check against the applied limits.
    pub fn is_both_sides_full(&self) -> bool {
        matches!(&self.bid, Some(s) if s.is_full) && matches!(&self.ask, Some(s) if s.is_full)
    }
}

/// An incremental mutation at a named ladder level.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRefresh {
    pub action: DeltaAction,
    pub level: usize,
    pub price: Option<f64>,
    pub qty: Option<f64>,
}

/// A classified L2 update, ready to apply to a book.
#[derive(Debug, Clone, PartialEq)]
pub enum BookUpdate {
    Overlap(OverlapRefresh),
    Delta(DeltaRefresh),
    MaxVisibleDepth(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_cover_0_to_10() {
        assert_eq!(DeltaAction::from_code(0), Some(DeltaAction::AllClearFromLevel));
        assert_eq!(DeltaAction::from_code(3), Some(DeltaAction::BidInsertAtLevel));
        assert_eq!(DeltaAction::from_code(10), Some(DeltaAction::AskRemoveLevelAndAppend));
        assert_eq!(DeltaAction::from_code(11), None);
    }

    #[test]
    fn both_sides_full_requires_both() {
        let side = |full| SideRefresh { is_full: full, start_level: 0, limits: vec![] };
        let both = OverlapRefresh { bid: Some(side(true)), ask: Some(side(true)) };
        assert!(both.is_both_sides_full());
        let partial = OverlapRefresh { bid: Some(side(true)), ask: Some(side(false)) };
        assert!(!partial.is_both_sides_full());
        let one = OverlapRefresh { bid: Some(side(true)), ask: None };
        assert!(!one.is_both_sides_full());
    }
}
