//! Result persistence: the sink the driver hands time series to.
//!
//! The driver opens the sink with the run identifier, appends the equity
//! curve and one series per ticker when the run terminates, then closes it.
//! Sinks only ever append; nothing is read back.

use crate::domain::{PortfolioSnapshot, PositionSide, RunId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Series name the portfolio equity curve is written under.
pub const PORTFOLIO_SERIES: &str = "PORTFOLIO";

/// Whether a ticker's series would land on the equity curve. Case-insensitive
/// since file-backed sinks may sit on case-insensitive filesystems.
pub fn is_reserved_ticker(ticker: &str) -> bool {
    ticker.eq_ignore_ascii_case(PORTFOLIO_SERIES)
}

/// Whether `name` can be used as a single file name inside a run directory.
pub fn is_file_safe_series(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        && !name.contains("..")
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is not open")]
    NotOpen,

    #[error("sink already open for run {0}")]
    AlreadyOpen(RunId),

    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode series {series}: {message}")]
    Encode { series: String, message: String },

    #[error("ticker {0} collides with the PORTFOLIO equity series")]
    ReservedSeries(String),

    #[error("series name {0:?} is not a plain file name")]
    InvalidSeriesName(String),
}

/// One row of a named time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, f64>,
}

impl SeriesRow {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: f64) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }
}

/// Destination for a run's time series.
pub trait ResultSink {
    fn open(&mut self, run_id: &RunId) -> Result<(), SinkError>;

    /// Append rows to the series named `ticker`.
    fn append(&mut self, ticker: &str, rows: &[SeriesRow]) -> Result<(), SinkError>;

    fn close(&mut self) -> Result<(), SinkError>;
}

/// Equity curve: one row per snapshot.
pub fn equity_series(snapshots: &[PortfolioSnapshot], initial_capital: f64) -> Vec<SeriesRow> {
    snapshots
        .iter()
        .map(|s| {
            SeriesRow::new(s.timestamp)
                .with("cash", s.cash)
                .with("market_value", s.market_value)
                .with("total_equity", s.total_equity())
                .with("roi", s.return_on_investment(initial_capital))
                .with("positions", s.holdings.len() as f64)
        })
        .collect()
}

/// Per-ticker holding series, one row for every snapshot the ticker was held in.
pub fn holding_series(snapshots: &[PortfolioSnapshot]) -> BTreeMap<String, Vec<SeriesRow>> {
    let mut out: BTreeMap<String, Vec<SeriesRow>> = BTreeMap::new();
    for snapshot in snapshots {
        for (ticker, h) in &snapshot.holdings {
            let side = match h.position {
                PositionSide::Long => 1.0,
                PositionSide::Short => -1.0,
            };
            let row = SeriesRow::new(snapshot.timestamp)
                .with("side", side)
                .with("shares_owned", h.shares_owned as f64)
                .with("average_share_price_paid", h.average_share_price_paid)
                .with("latest_price", h.latest_price)
                .with("total_position_cost", h.total_position_cost)
                .with("total_position_value", h.total_position_value)
                .with("unrealized_pnl", h.unrealized_pnl());
            out.entry(ticker.clone()).or_default().push(row);
        }
    }
    out
}

/// Keeps everything in memory. Used by tests and by callers that post-process
/// series themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    run_id: Option<RunId>,
    series: BTreeMap<String, Vec<SeriesRow>>,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn series(&self, ticker: &str) -> Option<&[SeriesRow]> {
        self.series.get(ticker).map(Vec::as_slice)
    }

    pub fn series_names(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ResultSink for MemorySink {
    fn open(&mut self, run_id: &RunId) -> Result<(), SinkError> {
        if let Some(existing) = &self.run_id {
            if !self.closed {
                return Err(SinkError::AlreadyOpen(existing.clone()));
            }
        }
        self.run_id = Some(run_id.clone());
        self.series.clear();
        self.closed = false;
        Ok(())
    }

    fn append(&mut self, ticker: &str, rows: &[SeriesRow]) -> Result<(), SinkError> {
        if self.run_id.is_none() || self.closed {
            return Err(SinkError::NotOpen);
        }
        self.series
            .entry(ticker.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.run_id.is_none() || self.closed {
            return Err(SinkError::NotOpen);
        }
        self.closed = true;
        Ok(())
    }
}

/// Forwarding impl so callers can keep ownership of the sink and inspect it
/// after the run.
impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn open(&mut self, run_id: &RunId) -> Result<(), SinkError> {
        (**self).open(run_id)
    }

    fn append(&mut self, ticker: &str, rows: &[SeriesRow]) -> Result<(), SinkError> {
        (**self).append(ticker, rows)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }
}
