//! Per-(instrument, day) replay loop.
//!
//! A worker owns its instrument's books, trades handler, and output stream
//! for the duration of one day; nothing is shared with other workers. Within
//! a tick, book updates are applied before trades are aggregated before
//! features are evaluated; input order inside an interval is the sole source
//! of truth for final book state.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use qh_core::error::{ReplayError, Result};
use qh_core::time_util::format_us;
use qh_core::types::{
    LAYER_WIDTH, MissingValuePolicy, NUM_LAYERS, OHLCVA_WIDTH, RawL1Record, RawL2Record,
    SNAPSHOT_LEVELS, Value,
};
use qh_md::{ConsistencyChecker, LocalOrderBook, decoder};
use qh_td::{Feature, TradesHandler};

use crate::grid::Interval;
use crate::output;

/// Everything a worker needs to replay one instrument for one day.
pub struct ReplayJob {
    pub code: String,
    pub l2: Vec<Interval<RawL2Record>>,
    pub l1: Vec<Interval<RawL1Record>>,
    pub books: Vec<LocalOrderBook>,
    pub trades: TradesHandler,
    pub features: Vec<Box<dyn Feature>>,
    pub dest: PathBuf,
    pub buffer_size: usize,
    pub missing: MissingValuePolicy,
    pub carry_over: Option<Vec<Value>>,
}

/// Summary of a successfully replayed day.
#[derive(Debug)]
pub struct DayReport {
    /// The last emitted row — next day's `prev_data`.
    pub carry_over: Vec<Value>,
    /// Consistency-check accuracy; `None` if no full refresh pair occurred.
    pub accuracy: Option<f64>,
    /// Grid ticks written.
    pub ticks: usize,
}

/// Outcome of a job. The instrument state always comes back to the
/// coordinator, whether the day succeeded or not.
pub struct WorkerOutcome {
    pub code: String,
    pub books: Vec<LocalOrderBook>,
    pub trades: TradesHandler,
    pub result: Result<DayReport>,
}

/// Run one job to completion.
pub fn run(job: ReplayJob) -> WorkerOutcome {
    let ReplayJob {
        code,
        l2,
        l1,
        mut books,
        mut trades,
        features,
        dest,
        buffer_size,
        missing,
        carry_over,
    } = job;
    let result = replay_day(
        &code,
        &l2,
        &l1,
        &mut books,
        &mut trades,
        &features,
        &dest,
        buffer_size,
        missing,
        carry_over,
    );
    WorkerOutcome { code, books, trades, result }
}

#[allow(clippy::too_many_arguments)]
fn replay_day(
    code: &str,
    l2: &[Interval<RawL2Record>],
    l1: &[Interval<RawL1Record>],
    books: &mut [LocalOrderBook],
    trades: &mut TradesHandler,
    features: &[Box<dyn Feature>],
    dest: &Path,
    buffer_size: usize,
    missing: MissingValuePolicy,
    carry_over: Option<Vec<Value>>,
) -> Result<DayReport> {
    if l2.len() != l1.len() {
        return Err(ReplayError::Invariant(format!(
            "partition row counts diverge for {code}: l2={} l1={}",
            l2.len(),
            l1.len()
        )));
    }

    let file = OpenOptions::new().append(true).open(dest)?;
    let mut out = BufWriter::with_capacity(buffer_size, file);
    let mut checker = ConsistencyChecker::new();
    let mut prev = carry_over;
    let row_width = NUM_LAYERS * LAYER_WIDTH + OHLCVA_WIDTH + features.len();

    for (l2_tick, l1_tick) in l2.iter().zip(l1) {
        if l2_tick.ts_us != l1_tick.ts_us {
            return Err(ReplayError::Invariant(format!(
                "tick timestamps diverge for {code}: l2={} l1={}",
                format_us(l2_tick.ts_us),
                format_us(l1_tick.ts_us)
            )));
        }

        for rec in &l2_tick.rows {
            let Some(layer_id) = rec.layer_id else { continue };
            let book = usize::try_from(layer_id)
                .ok()
                .and_then(|layer| books.get_mut(layer))
                .ok_or_else(|| {
                    ReplayError::Schema(format!("layer id {layer_id} out of range for {code}"))
                })?;
            if let Some(update) = decoder::decode(rec)? {
                if let Some(applied) = decoder::apply(book, update)? {
                    checker.verify(book, &applied.bid_limits, &applied.ask_limits, l2_tick.ts_us);
                }
            }
        }

        for rec in &l1_tick.rows {
            trades.handle_trades(rec.last_price, rec.last_trade_quantity);
        }

        let mut data: Vec<Value> = Vec::with_capacity(row_width);
        for book in books.iter() {
            book.snapshot_into(&mut data, SNAPSHOT_LEVELS);
        }
        data.extend(trades.get_ohlcva());

        let vwap = trades.vwap();
        let computed: Vec<Value> =
            features.iter().map(|f| f.compute(&data, prev.as_deref(), vwap)).collect();
        for (feature, value) in features.iter().zip(computed) {
            if feature.emit() {
                data.push(value);
            }
        }

        output::write_row(&mut out, &data, l2_tick.ts_us, missing)?;
        prev = Some(data);
    }

    out.flush()?;
    let carry = prev.ok_or_else(|| {
        ReplayError::Invariant(format!("no grid ticks replayed for {code}"))
    })?;
    Ok(DayReport { carry_over: carry, accuracy: checker.accuracy(), ticks: l2.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qh_core::time_util::US_PER_HOUR;
    use qh_td::default_features;

    fn interval<T>(ts_us: i64, rows: Vec<T>) -> Interval<T> {
        Interval { ts_us, rows }
    }

    fn overlap(code: &str) -> RawL2Record {
        RawL2Record {
            code: code.into(),
            layer_id: Some(0),
            bid_change_indicator: Some(-1),
            ask_change_indicator: Some(-1),
            bid_limits: Some("[100.0,5][99.0,3][98.0,2][97.0,2][96.0,1]".into()),
            ask_limits: Some("[101.0,4][102.0,6][103.0,2][104.0,2][105.0,1]".into()),
            ..RawL2Record::default()
        }
    }

    fn trade(code: &str, price: f64, qty: f64) -> RawL1Record {
        RawL1Record {
            code: code.into(),
            last_price: Some(price),
            last_trade_quantity: Some(qty),
            ..RawL1Record::default()
        }
    }

    fn test_job(dest: PathBuf) -> ReplayJob {
        let code = "648646240";
        let freq = 6 * US_PER_HOUR;
        let l2 = vec![
            interval(freq, vec![RawL2Record::blank(code), overlap(code)]),
            interval(2 * freq, vec![]),
            interval(3 * freq, vec![]),
            interval(4 * freq, vec![RawL2Record::blank(code)]),
        ];
        let l1 = vec![
            interval(freq, vec![RawL1Record::blank(code), trade(code, 101.0, 1.0)]),
            interval(2 * freq, vec![trade(code, 102.0, 2.0), trade(code, 100.0, 1.0)]),
            interval(3 * freq, vec![]),
            interval(4 * freq, vec![RawL1Record::blank(code)]),
        ];
        ReplayJob {
            code: code.into(),
            l2,
            l1,
            books: (0..NUM_LAYERS).map(|layer| LocalOrderBook::new(code, layer, 15)).collect(),
            trades: TradesHandler::new(code),
            features: default_features(),
            dest,
            buffer_size: 1 << 12,
            missing: MissingValuePolicy::Nan,
            carry_over: None,
        }
    }

    fn temp_csv(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("qh-worker-{}-{name}.csv", std::process::id()));
        std::fs::write(&path, "header\n").unwrap();
        path
    }

    #[test]
    fn replays_a_day_and_returns_carry_over() {
        let dest = temp_csv("day");
        let outcome = run(test_job(dest.clone()));
        let report = outcome.result.unwrap();
        assert_eq!(report.ticks, 4);
        // One full both-sides refresh -> one consistent check.
        assert_eq!(report.accuracy, Some(1.0));

        let content = std::fs::read_to_string(&dest).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1 + 4);

        // Tick 0: book populated, one trade, features missing (no prev row).
        let first: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(first[0], "100");
        assert_eq!(first[240], "101"); // open
        assert_eq!(first[246], "NaN"); // oir without prev_data
        assert!(first[249].starts_with("1970-01-01 06:00:00"));

        // Tick 1: two trades, features now defined.
        let second: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(second[243], "100"); // close
        assert_eq!(second[244], "3"); // volume
        assert_ne!(second[246], "NaN");

        // Carry-over equals the last written row's values.
        assert_eq!(report.carry_over.len(), 249);
        assert_eq!(report.carry_over[0], Some(100.0));

        // Books come back mutated for the next day.
        assert_eq!(outcome.books[0].best_bid_price(), Some(100.0));
        std::fs::remove_file(&dest).ok();
    }

    #[test]
    fn carry_over_feeds_first_tick_features() {
        let dest = temp_csv("carry");
        let mut job = test_job(dest.clone());
        let mut prev = vec![Some(1.0); 249];
        prev[0] = Some(99.0); // prev best bid
        prev[20] = Some(100.0); // prev best ask
        job.carry_over = Some(prev);
        let outcome = run(job);
        outcome.result.unwrap();

        let content = std::fs::read_to_string(&dest).unwrap();
        let first: Vec<&str> = content.lines().nth(1).unwrap().split(',').collect();
        // oir defined on the very first tick of the day.
        assert_ne!(first[246], "NaN");
        std::fs::remove_file(&dest).ok();
    }

    #[test]
    fn diverging_tick_timestamps_are_fatal() {
        let dest = temp_csv("diverge");
        let mut job = test_job(dest.clone());
        job.l1[1].ts_us += 1;
        let outcome = run(job);
        assert!(matches!(outcome.result, Err(ReplayError::Invariant(_))));
        std::fs::remove_file(&dest).ok();
    }

    #[test]
    fn mismatched_partition_lengths_are_fatal() {
        let dest = temp_csv("lengths");
        let mut job = test_job(dest.clone());
        job.l1.pop();
        let outcome = run(job);
        assert!(matches!(outcome.result, Err(ReplayError::Invariant(_))));
        std::fs::remove_file(&dest).ok();
    }

    #[test]
    fn null_layer_rows_are_skipped() {
        let dest = temp_csv("nulllayer");
        let mut job = test_job(dest.clone());
        // A payload row with no LayerId must not touch any book.
        let mut rogue = overlap(&job.code);
        rogue.layer_id = None;
        rogue.bid_limits = Some("[1.0,1]".into());
        job.l2[1].rows.push(rogue);
        let outcome = run(job);
        outcome.result.unwrap();
        assert_eq!(outcome.books[0].best_bid_price(), Some(100.0));
        std::fs::remove_file(&dest).ok();
    }
}
