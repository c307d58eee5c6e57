//! CSV bar loading.
//!
//! One file per ticker, `<dir>/<TICKER>.csv`, with a header row:
//!
//! ```text
//! timestamp,open,high,low,close,volume
//! 2024-01-02,100.0,101.5,99.2,100.8,1200000
//! ```
//!
//! Timestamps may be dates or date-times. Rows must be strictly ascending
//! within a file. Bars outside the optional date window are dropped.

use chrono::{NaiveDate, NaiveDateTime};
use eventlab_core::domain::{Bar, BarBatch};
use eventlab_core::feed::{BarFeed, FeedError, InMemoryBarFeed};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: {message}")]
    BadRow {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("no bars for '{ticker}' in the requested window")]
    Empty { ticker: String },
}

/// Inclusive date window applied while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl LoadOptions {
    fn contains(&self, ts: NaiveDateTime) -> bool {
        let day = ts.date();
        self.start.map_or(true, |s| day >= s) && self.end.map_or(true, |e| day <= e)
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Accepts `YYYY-MM-DD` (midnight) or a date-time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

/// Path of the CSV file for `ticker` under `dir`.
pub fn ticker_path(dir: &Path, ticker: &str) -> PathBuf {
    dir.join(format!("{ticker}.csv"))
}

/// Read every bar for one ticker from `path`.
pub fn load_ticker_csv(path: &Path, ticker: &str, opts: &LoadOptions) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let bad_row = |line: usize, message: String| LoadError::BadRow {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut bars = Vec::new();
    let mut last: Option<NaiveDateTime> = None;
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = row.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        let ts = parse_timestamp(&row.timestamp)
            .ok_or_else(|| bad_row(line, format!("unparseable timestamp '{}'", row.timestamp)))?;
        if let Some(prev) = last {
            if ts <= prev {
                return Err(bad_row(line, format!("timestamp {ts} not after {prev}")));
            }
        }
        last = Some(ts);

        if !(row.volume.is_finite() && row.volume >= 0.0) {
            return Err(bad_row(line, format!("invalid volume {}", row.volume)));
        }
        if !opts.contains(ts) {
            continue;
        }

        let bar = Bar::new(
            ticker,
            ts,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume as u64,
        )
        .map_err(|e| bad_row(line, e.to_string()))?;
        bars.push(bar);
    }

    debug!(ticker, path = %path.display(), bars = bars.len(), "loaded CSV");
    Ok(bars)
}

/// Bar feed over a directory of per-ticker CSV files.
///
/// Everything is read up front; iteration then behaves exactly like the
/// in-memory feed, one batch per distinct timestamp across all tickers.
#[derive(Debug)]
pub struct CsvBarFeed {
    dir: PathBuf,
    inner: InMemoryBarFeed,
}

impl CsvBarFeed {
    pub fn load(dir: &Path, tickers: &[String], opts: &LoadOptions) -> Result<Self, LoadError> {
        let mut all = Vec::new();
        for ticker in tickers {
            let bars = load_ticker_csv(&ticker_path(dir, ticker), ticker, opts)?;
            if bars.is_empty() {
                return Err(LoadError::Empty {
                    ticker: ticker.clone(),
                });
            }
            all.extend(bars);
        }
        let inner = InMemoryBarFeed::from_bars(all)?.with_name("csv");
        info!(
            dir = %dir.display(),
            tickers = tickers.len(),
            batches = inner.remaining(),
            "CSV feed ready"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            inner,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }
}

impl BarFeed for CsvBarFeed {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn tickers(&self) -> Vec<String> {
        self.inner.tickers()
    }

    fn next_batch(&mut self) -> Result<Option<BarBatch>, FeedError> {
        self.inner.next_batch()
    }

    fn current_batch(&self) -> Option<&BarBatch> {
        self.inner.current_batch()
    }

    fn latest_bar(&self, ticker: &str) -> Option<&Bar> {
        self.inner.latest_bar(ticker)
    }

    fn latest_bars(&self, ticker: &str, n: usize) -> &[Bar] {
        self.inner.latest_bars(ticker, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, ticker: &str, body: &str) {
        let mut f = std::fs::File::create(ticker_path(dir, ticker)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    const HEADER: &str = "timestamp,open,high,low,close,volume\n";

    #[test]
    fn test_parse_timestamp_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01"), Some(midnight));
        assert_eq!(
            parse_timestamp("2024-03-01 15:30:00"),
            midnight.date().and_hms_opt(15, 30, 0)
        );
        assert_eq!(
            parse_timestamp("2024-03-01T09:30:00"),
            midnight.date().and_hms_opt(9, 30, 0)
        );
        assert_eq!(parse_timestamp("03/01/2024"), None);
    }

    #[test]
    fn test_load_and_window() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "SPY",
            &format!(
                "{HEADER}2024-01-02,10,11,9,10.5,100\n2024-01-03,10.5,12,10,11,200\n2024-01-04,11,11,10,10,300\n"
            ),
        );
        let path = ticker_path(dir.path(), "SPY");

        let all = load_ticker_csv(&path, "SPY", &LoadOptions::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].close, 11.0);
        assert_eq!(all[2].volume, 300);

        let opts = LoadOptions {
            start: NaiveDate::from_ymd_opt(2024, 1, 3),
            end: NaiveDate::from_ymd_opt(2024, 1, 3),
        };
        let window = load_ticker_csv(&path, "SPY", &opts).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].open, 10.5);
    }

    #[test]
    fn test_out_of_order_rows_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "SPY",
            &format!("{HEADER}2024-01-03,10,11,9,10,1\n2024-01-02,10,11,9,10,1\n"),
        );
        let err = load_ticker_csv(&ticker_path(dir.path(), "SPY"), "SPY", &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::BadRow { line: 3, .. }));
    }

    #[test]
    fn test_invalid_bar_rejected() {
        let dir = tempfile::tempdir().unwrap();
        // high below low
        write_csv(dir.path(), "SPY", &format!("{HEADER}2024-01-02,10,8,9,10,1\n"));
        let err = load_ticker_csv(&ticker_path(dir.path(), "SPY"), "SPY", &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::BadRow { line: 2, .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvBarFeed::load(dir.path(), &["NOPE".to_string()], &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_feed_merges_tickers() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "AAA",
            &format!("{HEADER}2024-01-02,1,1,1,1,1\n2024-01-03,2,2,2,2,1\n"),
        );
        write_csv(dir.path(), "BBB", &format!("{HEADER}2024-01-03,5,5,5,5,1\n"));

        let mut feed = CsvBarFeed::load(
            dir.path(),
            &["AAA".to_string(), "BBB".to_string()],
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(feed.name(), "csv");
        assert_eq!(feed.tickers(), vec!["AAA", "BBB"]);
        assert_eq!(feed.remaining(), 2);

        let first = feed.next_batch().unwrap().unwrap();
        assert_eq!(first.len(), 1);
        let second = feed.next_batch().unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(feed.latest_bar("BBB").unwrap().close, 5.0);
        assert!(feed.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_empty_window_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA", &format!("{HEADER}2024-01-02,1,1,1,1,1\n"));
        let opts = LoadOptions {
            start: NaiveDate::from_ymd_opt(2025, 1, 1),
            end: None,
        };
        let err = CsvBarFeed::load(dir.path(), &["AAA".to_string()], &opts).unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
    }
}
