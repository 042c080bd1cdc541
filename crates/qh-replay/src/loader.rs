//! Gzipped-CSV table loading and timestamp normalization.
//!
//! Each input file is decoded in one pass into typed raw records, and every
//! row is stamped with its normalized microsecond timestamp:
//!
//! - L2 rows coalesce `DeltaRefresh_ServerTimestamp` and
//!   `OverlapRefresh_ServerTimestamp`, then backward-fill gaps — only
//!   MaxVisibleDepth messages carry null timestamps, and those do not affect
//!   books, so inheriting the next row's time is safe.
//! - L1 rows use `ServerTimestamp` directly.
//!
//! Rows that end up without any timestamp (a trailing run with no successor)
//! are dropped with a warning.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use tracing::warn;

use qh_core::error::{ReplayError, Result};
use qh_core::time_util::parse_server_timestamp;
use qh_core::types::{RawL1Record, RawL2Record};

/// A raw record paired with its normalized timestamp.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    pub ts_us: i64,
    pub rec: T,
}

/// Load one day's L2 book update table.
pub fn load_l2(path: &Path) -> Result<Vec<Stamped<RawL2Record>>> {
    let file = File::open(path)
        .map_err(|e| ReplayError::Schema(format!("cannot open {}: {e}", path.display())))?;
    read_l2(BufReader::new(GzDecoder::new(file)))
}

/// Load one day's L1 trades table.
pub fn load_l1(path: &Path) -> Result<Vec<Stamped<RawL1Record>>> {
    let file = File::open(path)
        .map_err(|e| ReplayError::Schema(format!("cannot open {}: {e}", path.display())))?;
    read_l1(BufReader::new(GzDecoder::new(file)))
}

/// Decode L2 records from an already-decompressed CSV stream.
pub fn read_l2<R: Read>(reader: R) -> Result<Vec<Stamped<RawL2Record>>> {
    let mut csv_reader = ReaderBuilder::new().from_reader(reader);
    let mut rows: Vec<(Option<i64>, RawL2Record)> = Vec::new();
    for result in csv_reader.deserialize() {
        let rec: RawL2Record =
            result.map_err(|e| ReplayError::Schema(format!("bad L2 row: {e}")))?;
        let ts = rec
            .delta_server_timestamp
            .as_deref()
            .or(rec.overlap_server_timestamp.as_deref())
            .and_then(parse_server_timestamp);
        rows.push((ts, rec));
    }
    Ok(backward_fill(rows, "L2"))
}

/// Decode L1 records from an already-decompressed CSV stream.
pub fn read_l1<R: Read>(reader: R) -> Result<Vec<Stamped<RawL1Record>>> {
    let mut csv_reader = ReaderBuilder::new().from_reader(reader);
    let mut rows: Vec<(Option<i64>, RawL1Record)> = Vec::new();
    for result in csv_reader.deserialize() {
        let rec: RawL1Record =
            result.map_err(|e| ReplayError::Schema(format!("bad L1 row: {e}")))?;
        let ts = rec.server_timestamp.as_deref().and_then(parse_server_timestamp);
        rows.push((ts, rec));
    }
    Ok(backward_fill(rows, "L1"))
}

/// Fill missing timestamps from the next stamped row, preserving order.
fn backward_fill<T>(rows: Vec<(Option<i64>, T)>, label: &str) -> Vec<Stamped<T>> {
    let mut filled = Vec::with_capacity(rows.len());
    let mut carry: Option<i64> = None;
    let mut dropped = 0usize;
    for (ts, rec) in rows.into_iter().rev() {
        if ts.is_some() {
            carry = ts;
        }
        match carry {
            Some(ts_us) => filled.push(Stamped { ts_us, rec }),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!("dropped {dropped} trailing {label} rows without timestamps");
    }
    filled.reverse();
    filled
}
