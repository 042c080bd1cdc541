//! # qh-td
//!
//! Level-1 trade data machinery:
//!
//! - [`ohlcva`] — per-interval OHLCVA + VWAP accumulation
//! - [`features`] — stateless per-tick microstructure features and their registry

pub mod features;
pub mod ohlcva;

pub use features::{Feature, default_features};
pub use ohlcva::TradesHandler;
