//! Day-by-day replay coordination.
//!
//! The [`Replayer`] owns the dates list, the universe, and all cross-day
//! instrument state (books, trade handlers, carry-over rows). Each call to
//! [`Replayer::compute_day`] loads one day, aligns it onto the grid, and
//! fans the per-instrument partitions out to a bounded pool of blocking
//! workers. State mutations happen strictly between day boundaries.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use qh_core::config::ReplayConfig;
use qh_core::error::{ReplayError, Result};
use qh_core::time_util::session_start_us;
use qh_core::types::{BLANK_CODE, NUM_LAYERS, Value};
use qh_md::LocalOrderBook;
use qh_td::{TradesHandler, default_features};

use crate::grid::{self, DayGrid};
use crate::loader::{self, Stamped};
use crate::output;
use crate::worker::{self, ReplayJob, WorkerOutcome};

/// Main coordinator of the feature generation process.
pub struct Replayer {
    config: ReplayConfig,
    dates: VecDeque<NaiveDate>,
    universe: Vec<String>,
    books: AHashMap<String, Vec<LocalOrderBook>>,
    trades: AHashMap<String, TradesHandler>,
    carry_over: AHashMap<String, Vec<Value>>,
    dest_paths: AHashMap<String, PathBuf>,
}

impl Replayer {
    /// Validate the source layout, enumerate replayable dates, and create the
    /// destination directory. Books are allocated lazily on the first day
    /// (the universe may have to be inferred from it).
    pub fn new(config: ReplayConfig) -> Result<Self> {
        config.validate()?;
        let start = qh_core::time_util::parse_date(&config.start_date)
            .ok_or_else(|| ReplayError::Config("invalid start_date".into()))?;

        let dates = list_dates(Path::new(&config.source_dir), &config.exchange_id, start)?;
        if dates.is_empty() {
            return Err(ReplayError::Config(format!(
                "no replayable dates in {} from {} on",
                config.source_dir, config.start_date
            )));
        }
        info!("found {} replayable date(s), first {}", dates.len(), dates[0]);

        fs::create_dir_all(&config.destination_dir)?;

        Ok(Self {
            config,
            dates: dates.into(),
            universe: Vec::new(),
            books: AHashMap::new(),
            trades: AHashMap::new(),
            carry_over: AHashMap::new(),
            dest_paths: AHashMap::new(),
        })
    }

    /// Dates not yet replayed.
    pub fn dates_remaining(&self) -> usize {
        self.dates.len()
    }

    /// The instrument universe; empty until the first day fixed it.
    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Replay the next date end to end. Returns the date replayed, or
    /// [`ReplayError::DataExhausted`] once the dates list is empty.
    pub async fn compute_day(&mut self) -> Result<NaiveDate> {
        let date = self.dates.pop_front().ok_or(ReplayError::DataExhausted)?;
        let date_str = date.format("%Y-%m-%d").to_string();
        let grid = DayGrid::new(
            session_start_us(date, self.config.session_offset_hours),
            self.config.frequency_us(),
        );

        let source = Path::new(&self.config.source_dir);
        let eid = &self.config.exchange_id;
        let mut l2 = loader::load_l2(
            &source.join("l2_data").join(format!("{date_str}_{eid}_L2.csv.gz")),
        )?;
        let mut l1 = loader::load_l1(
            &source.join("l1_data").join(format!("{date_str}_{eid}_L1-Trades.csv.gz")),
        )?;
        info!("{date_str}: loaded {} L2 rows, {} L1 rows", l2.len(), l1.len());

        if !self.config.universe.is_empty() {
            let universe = &self.config.universe;
            let keep = |code: &str| code == BLANK_CODE || universe.iter().any(|c| c == code);
            l2.retain(|row| keep(&row.rec.code));
            l1.retain(|row| keep(&row.rec.code));
        }
        if self.books.is_empty() {
            self.init_universe(&l2)?;
        }

        let mut l2_parts = grid::align_day(l2, grid, &self.universe)?;
        let mut l1_parts = grid::align_day(l1, grid, &self.universe)?;
        for code in &self.universe {
            let l2_ticks = l2_parts.get(code).map_or(0, Vec::len);
            let l1_ticks = l1_parts.get(code).map_or(0, Vec::len);
            if l2_ticks != l1_ticks {
                return Err(ReplayError::Invariant(format!(
                    "{date_str}: partitions for {code} disagree: l2={l2_ticks} l1={l1_ticks}"
                )));
            }
        }
        info!("{date_str}: aligned {} instrument partition(s)", l2_parts.len());

        self.dispatch(&date_str, &mut l2_parts, &mut l1_parts).await;
        self.restore_lost_state();
        Ok(date)
    }

    /// Fan one day's partitions out to the worker pool and fold the outcomes
    /// back into coordinator state. Worker failures are logged, never
    /// propagated; carry-over moves only on success.
    async fn dispatch(
        &mut self,
        date_str: &str,
        l2_parts: &mut AHashMap<String, Vec<grid::Interval<qh_core::types::RawL2Record>>>,
        l1_parts: &mut AHashMap<String, Vec<grid::Interval<qh_core::types::RawL1Record>>>,
    ) {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<ReplayJob>();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<WorkerOutcome>();

        let pool_size = self.config.max_workers.min(self.universe.len()).max(1);
        let mut handles = Vec::with_capacity(pool_size);
        for slot in 0..pool_size {
            let rx = job_rx.clone();
            let tx = outcome_tx.clone();
            let core = self
                .config
                .cpu_affinity
                .as_ref()
                .filter(|cores| !cores.is_empty())
                .map(|cores| cores[slot % cores.len()]);
            handles.push(tokio::task::spawn_blocking(move || {
                qh_core::cpu_affinity::maybe_bind(core);
                while let Ok(job) = rx.recv() {
                    let outcome = worker::run(job);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(job_rx);
        drop(outcome_tx);

        for code in &self.universe {
            let (Some(l2), Some(l1)) = (l2_parts.remove(code), l1_parts.remove(code)) else {
                continue;
            };
            let (Some(books), Some(trades), Some(dest)) = (
                self.books.remove(code),
                self.trades.remove(code),
                self.dest_paths.get(code).cloned(),
            ) else {
                continue;
            };
            let job = ReplayJob {
                code: code.clone(),
                l2,
                l1,
                books,
                trades,
                features: default_features(),
                dest,
                buffer_size: self.config.buffer_size,
                missing: self.config.missing_value,
                carry_over: self.carry_over.get(code).cloned(),
            };
            if let Err(rejected) = job_tx.send(job) {
                error!("{date_str}: worker pool went away, day incomplete");
                let job = rejected.0;
                self.books.insert(job.code.clone(), job.books);
                self.trades.insert(job.code, job.trades);
                break;
            }
        }
        drop(job_tx);

        // Workers drain the job queue and exit when it closes; outcomes are
        // buffered in the unbounded channel until then.
        for handle in handles {
            if let Err(e) = handle.await {
                error!("{date_str}: worker task panicked: {e}");
            }
        }

        for outcome in outcome_rx.try_iter() {
            let WorkerOutcome { code, books, trades, result } = outcome;
            match result {
                Ok(report) => {
                    let accuracy = report
                        .accuracy
                        .map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}"));
                    info!(
                        "finished {code} {date_str}: {} ticks, accuracy {accuracy}",
                        report.ticks
                    );
                    self.carry_over.insert(code.clone(), report.carry_over);
                }
                Err(e) => {
                    // The day is abandoned for this instrument; carry-over
                    // keeps its last good row.
                    error!("replay failed for {code} {date_str}: {e}");
                }
            }
            self.books.insert(code.clone(), books);
            self.trades.insert(code, trades);
        }
    }

    /// Re-create state for instruments whose worker died without returning
    /// it (task panic). Their books restart empty; carry-over is untouched.
    fn restore_lost_state(&mut self) {
        for code in &self.universe {
            if !self.books.contains_key(code) {
                warn!("books for {code} were lost, recreating empty ladders");
                self.books.insert(code.clone(), new_books(code, self.config.initial_levels));
            }
            if !self.trades.contains_key(code) {
                self.trades.insert(code.clone(), TradesHandler::new(code));
            }
        }
    }

    /// Fix the universe, allocate per-instrument state, and write the output
    /// headers. Runs once, on the first replayed day.
    fn init_universe(&mut self, l2: &[Stamped<qh_core::types::RawL2Record>]) -> Result<()> {
        if self.config.universe.is_empty() {
            let codes: AHashSet<&str> = l2
                .iter()
                .map(|row| row.rec.code.as_str())
                .filter(|code| *code != BLANK_CODE)
                .collect();
            let mut universe: Vec<String> = codes.into_iter().map(String::from).collect();
            universe.sort();
            if universe.is_empty() {
                return Err(ReplayError::Schema(
                    "first day's L2 data contains no instrument codes".into(),
                ));
            }
            info!("inferred universe of {} instrument(s)", universe.len());
            self.universe = universe;
        } else {
            self.universe = self.config.universe.clone();
        }

        let features = default_features();
        let names: Vec<&str> =
            features.iter().filter(|f| f.emit()).map(|f| f.name()).collect();
        let header = output::csv_header(&names);

        let dest_dir = Path::new(&self.config.destination_dir);
        for code in &self.universe {
            self.books.insert(code.clone(), new_books(code, self.config.initial_levels));
            self.trades.insert(code.clone(), TradesHandler::new(code));
            let path = dest_dir.join(format!("{code}.csv"));
            let mut file = File::create(&path)?;
            writeln!(file, "{header}")?;
            self.dest_paths.insert(code.clone(), path);
        }
        Ok(())
    }
}

fn new_books(code: &str, initial_levels: usize) -> Vec<LocalOrderBook> {
    (0..NUM_LAYERS).map(|layer| LocalOrderBook::new(code, layer, initial_levels)).collect()
}

/// Enumerate replayable dates: the sorted intersection of the L2 and L1 file
/// sets, filtered to `>= start`.
fn list_dates(source_dir: &Path, eid: &str, start: NaiveDate) -> Result<Vec<NaiveDate>> {
    let l2_dates = scan_dates(&source_dir.join("l2_data"), &format!("_{eid}_L2.csv.gz"))?;
    let l1_dates = scan_dates(&source_dir.join("l1_data"), &format!("_{eid}_L1-Trades.csv.gz"))?;
    if l2_dates != l1_dates {
        warn!(
            "L2/L1 date sets differ ({} vs {} files); replaying the intersection",
            l2_dates.len(),
            l1_dates.len()
        );
    }

    let mut dates: Vec<NaiveDate> =
        l2_dates.intersection(&l1_dates).copied().filter(|d| *d >= start).collect();
    dates.sort();
    Ok(dates)
}

fn scan_dates(dir: &Path, suffix: &str) -> Result<AHashSet<NaiveDate>> {
    if !dir.is_dir() {
        return Err(ReplayError::Config(format!("{} is not a directory", dir.display())));
    }
    let mut dates = AHashSet::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if let Some(date) =
            name.strip_suffix(suffix).and_then(qh_core::time_util::parse_date)
        {
            dates.insert(date);
        }
    }
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use qh_core::time_util::{US_PER_HOUR, format_us};

    struct TempTree {
        root: PathBuf,
    }

    impl TempTree {
        fn new(tag: &str) -> Self {
            let root =
                std::env::temp_dir().join(format!("qh-coord-{}-{tag}", std::process::id()));
            fs::remove_dir_all(&root).ok();
            fs::create_dir_all(root.join("src/l2_data")).unwrap();
            fs::create_dir_all(root.join("src/l1_data")).unwrap();
            Self { root }
        }

        fn source(&self) -> PathBuf {
            self.root.join("src")
        }

        fn dest(&self) -> PathBuf {
            self.root.join("out")
        }

        fn write_gz(&self, rel: &str, content: &str) {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(content.as_bytes()).unwrap();
            fs::write(self.root.join("src").join(rel), encoder.finish().unwrap()).unwrap();
        }
    }

    impl Drop for TempTree {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.root).ok();
        }
    }

    fn config(tree: &TempTree) -> ReplayConfig {
        serde_json::from_str(&format!(
            r#"{{
                "source_dir": "{}",
                "exchange_id": "1027",
                "destination_dir": "{}",
                "start_date": "2018-12-01",
                "frequency_ms": 21600000,
                "max_workers": 2
            }}"#,
            tree.source().display(),
            tree.dest().display()
        ))
        .unwrap()
    }

    const L2_HEADER: &str = "Code,LayerId,DeltaRefresh_ServerTimestamp,OverlapRefresh_ServerTimestamp,\
OverlapRefresh_BidChangeIndicator,OverlapRefresh_AskChangeIndicator,OverlapRefresh_BidLimits,\
OverlapRefresh_AskLimits,MaxVisibleDepth_MaxVisibleDepth,DeltaRefresh_DeltaAction,\
DeltaRefresh_CumulatedUnits,DeltaRefresh_Level,DeltaRefresh_Price";

    const L1_HEADER: &str =
        "Code,ServerTimestamp,TradeEvent_LastPrice,TradeEvent_LastTradeQuantity";

    #[test]
    fn dates_are_the_sorted_intersection_from_start() {
        let tree = TempTree::new("dates");
        for date in ["2018-11-30", "2018-12-01", "2018-12-02"] {
            tree.write_gz(&format!("l2_data/{date}_1027_L2.csv.gz"), L2_HEADER);
        }
        for date in ["2018-12-01", "2018-12-02", "2018-12-03"] {
            tree.write_gz(&format!("l1_data/{date}_1027_L1-Trades.csv.gz"), L1_HEADER);
        }
        let start = qh_core::time_util::parse_date("2018-12-01").unwrap();
        let dates = list_dates(&tree.source(), "1027", start).unwrap();
        let formatted: Vec<String> =
            dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
        assert_eq!(formatted, ["2018-12-01", "2018-12-02"]);
    }

    #[test]
    fn missing_layout_is_a_config_error() {
        let tree = TempTree::new("layout");
        fs::remove_dir_all(tree.source().join("l1_data")).unwrap();
        let start = qh_core::time_util::parse_date("2018-12-01").unwrap();
        assert!(matches!(
            list_dates(&tree.source(), "1027", start),
            Err(ReplayError::Config(_))
        ));
    }

    #[tokio::test]
    async fn replays_one_day_end_to_end() {
        let tree = TempTree::new("e2e");
        let date = qh_core::time_util::parse_date("2018-12-01").unwrap();
        let start = session_start_us(date, 2);

        // One instrument, one full refresh and one trade within the session.
        let t0 = start + US_PER_HOUR;
        let l2 = format!(
            "{L2_HEADER}\n\
             IA,0,,{t0},-1,-1,\"[100.0,5][99.0,3]\",\"[101.0,4][102.0,6]\",,,,,\n"
        );
        let l1 = format!("{L1_HEADER}\nIA,{t0},101,2\n");
        tree.write_gz("l2_data/2018-12-01_1027_L2.csv.gz", &l2);
        tree.write_gz("l1_data/2018-12-01_1027_L1-Trades.csv.gz", &l1);

        let mut replayer = Replayer::new(config(&tree)).unwrap();
        assert_eq!(replayer.dates_remaining(), 1);
        let replayed = replayer.compute_day().await.unwrap();
        assert_eq!(replayed, date);

        // Universe inferred from the data.
        assert_eq!(replayer.universe(), ["IA".to_string()]);

        // 6h grid -> 4 ticks; header + 4 rows.
        let content = fs::read_to_string(tree.dest().join("IA.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1 + 4);
        assert!(lines[0].starts_with("layer_0_bid_price_0,"));
        assert!(lines[0].ends_with(",oir,mpb,voi,timestamp"));

        // Grid timestamps are uniform and start one period after the session.
        let freq_us = 6 * US_PER_HOUR;
        for (i, line) in lines[1..].iter().enumerate() {
            let ts = line.rsplit(',').next().unwrap();
            assert_eq!(ts, format_us(start + (i as i64 + 1) * freq_us));
        }

        // The refresh is visible from the first tick on.
        let first: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(first[0], "100");
        assert_eq!(first[240], "101"); // open from the single trade
        assert_eq!(first[244], "2"); // volume

        // Carry-over was rotated for the next day.
        assert_eq!(replayer.carry_over["IA"][0], Some(100.0));

        // No second day.
        assert!(matches!(
            replayer.compute_day().await,
            Err(ReplayError::DataExhausted)
        ));
    }

    #[tokio::test]
    async fn configured_universe_filters_instruments() {
        let tree = TempTree::new("filter");
        let date = qh_core::time_util::parse_date("2018-12-01").unwrap();
        let start = session_start_us(date, 2);
        let t0 = start + US_PER_HOUR;

        let l2 = format!(
            "{L2_HEADER}\n\
             IA,0,,{t0},-1,-1,\"[100.0,5]\",\"[101.0,4]\",,,,,\n\
             IB,0,,{t0},-1,-1,\"[200.0,5]\",\"[201.0,4]\",,,,,\n"
        );
        let l1 = format!("{L1_HEADER}\nIA,{t0},101,2\nIB,{t0},201,1\n");
        tree.write_gz("l2_data/2018-12-01_1027_L2.csv.gz", &l2);
        tree.write_gz("l1_data/2018-12-01_1027_L1-Trades.csv.gz", &l1);

        let mut cfg = config(&tree);
        cfg.universe = vec!["IB".to_string()];
        let mut replayer = Replayer::new(cfg).unwrap();
        replayer.compute_day().await.unwrap();

        assert!(tree.dest().join("IB.csv").exists());
        assert!(!tree.dest().join("IA.csv").exists());
    }
}
