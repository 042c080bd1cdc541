//! Time-uniform grid alignment.
//!
//! Reproduces a sorted group-by-dynamic with upsampling: every row is
//! assigned to the left-closed interval `[start + k·freq, start + (k+1)·freq)`
//! containing its timestamp, every interval of the session exists in the
//! output (empty ones included), and each interval is represented by its
//! upper boundary timestamp.
//!
//! Before bucketing, synthetic sentinel rows pin both ends of the session for
//! every instrument, and the day-boundary assertions are enforced — a day
//! whose data escapes its session window is not replayable.

use ahash::AHashMap;

use qh_core::error::{ReplayError, Result};
use qh_core::time_util::{US_PER_DAY, format_us};
use qh_core::types::{BLANK_CODE, RawL1Record, RawL2Record};

use crate::loader::Stamped;

/// Session geometry of one replay day.
#[derive(Debug, Clone, Copy)]
pub struct DayGrid {
    start_us: i64,
    freq_us: i64,
}

impl DayGrid {
    pub fn new(start_us: i64, freq_us: i64) -> Self {
        Self { start_us, freq_us }
    }

    pub fn start_us(&self) -> i64 {
        self.start_us
    }

    pub fn freq_us(&self) -> i64 {
        self.freq_us
    }

    /// Timestamp of the synthetic end-of-day sentinel: a sliver before the
    /// 24h boundary, so it lands inside the last interval instead of opening
    /// a new one.
    pub fn end_us(&self) -> i64 {
        self.start_us + US_PER_DAY - self.freq_us / 100
    }

    /// Number of grid ticks in the session.
    pub fn ticks(&self) -> usize {
        ((self.end_us() - self.start_us) / self.freq_us) as usize + 1
    }

    /// Representative (upper boundary) timestamp of interval `idx`.
    pub fn tick_timestamp(&self, idx: usize) -> i64 {
        self.start_us + (idx as i64 + 1) * self.freq_us
    }

    #[inline]
    fn interval_index(&self, ts_us: i64) -> usize {
        ((ts_us - self.start_us) / self.freq_us) as usize
    }
}

/// One grid interval: its representative timestamp plus the rows that fell
/// into it, in input order. Empty intervals have no rows.
#[derive(Debug, Clone)]
pub struct Interval<T> {
    pub ts_us: i64,
    pub rows: Vec<T>,
}

/// What the grid needs from a raw record type.
pub trait GridRecord {
    fn code(&self) -> &str;
    fn blank(code: &str) -> Self;
}

impl GridRecord for RawL2Record {
    fn code(&self) -> &str {
        &self.code
    }

    fn blank(code: &str) -> Self {
        RawL2Record::blank(code)
    }
}

impl GridRecord for RawL1Record {
    fn code(&self) -> &str {
        &self.code
    }

    fn blank(code: &str) -> Self {
        RawL1Record::blank(code)
    }
}

/// Align one day's table onto the grid, partitioned by instrument.
///
/// Steps: drop rows outside `[start, start + 24h)`, insert one sentinel row
/// per instrument at both session ends, enforce the day-boundary assertions,
/// partition by `Code` preserving order, and bucket every partition into
/// [`DayGrid::ticks`] intervals. Server-side `"blank"` rows participate in
/// the assertions but are not partitioned.
pub fn align_day<T: GridRecord>(
    rows: Vec<Stamped<T>>,
    grid: DayGrid,
    universe: &[String],
) -> Result<AHashMap<String, Vec<Interval<T>>>> {
    let start = grid.start_us();
    let end = grid.end_us();

    let mut table: Vec<Stamped<T>> = Vec::with_capacity(rows.len() + 2 * universe.len());
    for code in universe {
        table.push(Stamped { ts_us: start, rec: T::blank(code) });
    }
    table.extend(rows.into_iter().filter(|r| r.ts_us >= start && r.ts_us < start + US_PER_DAY));
    for code in universe {
        table.push(Stamped { ts_us: end, rec: T::blank(code) });
    }

    let min = table.iter().map(|r| r.ts_us).min().unwrap_or(start);
    let max = table.iter().map(|r| r.ts_us).max().unwrap_or(end);
    if min != start {
        return Err(ReplayError::Invariant(format!(
            "day min timestamp {} != session start {}",
            format_us(min),
            format_us(start)
        )));
    }
    if max != end {
        return Err(ReplayError::Invariant(format!(
            "day max timestamp {} != session end {}",
            format_us(max),
            format_us(end)
        )));
    }

    let ticks = grid.ticks();
    let mut partitions: AHashMap<String, Vec<Interval<T>>> = AHashMap::with_capacity(universe.len());
    for code in universe {
        let buckets = (0..ticks)
            .map(|idx| Interval { ts_us: grid.tick_timestamp(idx), rows: Vec::new() })
            .collect();
        partitions.insert(code.clone(), buckets);
    }

    for row in table {
        let code = row.rec.code();
        if code == BLANK_CODE {
            continue;
        }
        if let Some(buckets) = partitions.get_mut(code) {
            buckets[grid.interval_index(row.ts_us)].rows.push(row.rec);
        }
    }

    Ok(partitions)
}
