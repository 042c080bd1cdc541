//! Typed error definitions for the replayer.
//!
//! Provides [`ReplayError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result` at the binary seam.

use thiserror::Error;

/// Domain-specific errors for the replay pipeline.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Malformed input: bad gzip, missing columns, unparseable limits string.
    #[error("schema error: {0}")]
    Schema(String),

    /// Order book operation on an out-of-range level.
    #[error("book error: {0}")]
    Book(String),

    /// A replay invariant did not hold (timestamp mismatch, row-count
    /// mismatch, day-boundary violation). Fatal for the affected scope.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// No more dates left to replay.
    #[error("no more data to be replayed")]
    DataExhausted,

    /// Output file or source directory I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the workspace crates.
pub type Result<T> = std::result::Result<T, ReplayError>;
