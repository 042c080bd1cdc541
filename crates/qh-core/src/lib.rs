//! # qh-core
//!
//! Core crate for the replay system, providing:
//!
//! - **Types** (`types`) — update primitives, raw records, missing-value policy
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `ReplayError` via thiserror
//! - **CPU affinity** (`cpu_affinity`) — thread-to-core pinning for workers
//! - **Time utilities** (`time_util`) — microsecond timestamp parsing/formatting
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod cpu_affinity;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
