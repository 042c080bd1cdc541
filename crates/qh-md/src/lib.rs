//! # qh-md
//!
//! Level-2 market data machinery:
//!
//! - [`ladder`] — `LocalOrderBook`, fixed-capacity positional price/volume ladders
//! - [`decoder`] — raw row classification and dispatch onto a book
//! - [`consistency`] — verification of incremental state against full refreshes

pub mod consistency;
pub mod decoder;
pub mod ladder;

pub use consistency::ConsistencyChecker;
pub use decoder::AppliedRefresh;
pub use ladder::LocalOrderBook;
