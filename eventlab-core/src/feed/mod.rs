//! Bar feeds: the pull-based source of historical bars.
//!
//! The driver asks the feed for one batch per iteration. `Ok(None)` is the
//! end-of-history signal and terminates the run normally; errors are fatal.
//! Every feed keeps the bars it has handed out so strategies and the
//! portfolio can read the latest observation (and a lookback window) per ticker.

pub mod memory;
pub mod synthetic;

pub use memory::InMemoryBarFeed;
pub use synthetic::{SyntheticBarFeed, SyntheticConfig};

use crate::domain::{Bar, BarBatch, BarError};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while producing bars.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid bar: {0}")]
    InvalidBar(#[from] BarError),

    #[error("bars for {ticker} are not in time order at {timestamp}")]
    OutOfOrder { ticker: String, timestamp: String },

    #[error("duplicate bar for {ticker} at {timestamp}")]
    Duplicate { ticker: String, timestamp: String },

    #[error("invalid feed configuration: {0}")]
    InvalidConfig(String),

    #[error("feed I/O error: {0}")]
    Io(String),
}

/// Source of time-ordered bar batches.
pub trait BarFeed {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// Tickers this feed can produce.
    fn tickers(&self) -> Vec<String>;

    /// Advance one tick. `Ok(None)` signals end of history.
    fn next_batch(&mut self) -> Result<Option<BarBatch>, FeedError>;

    /// The batch most recently returned by `next_batch`.
    fn current_batch(&self) -> Option<&BarBatch>;

    /// Most recent bar seen for `ticker`, from any earlier or the current batch.
    fn latest_bar(&self, ticker: &str) -> Option<&Bar>;

    /// Up to `n` most recent bars for `ticker`, oldest first.
    fn latest_bars(&self, ticker: &str, n: usize) -> &[Bar];
}

/// Per-ticker record of the bars a feed has emitted.
#[derive(Debug, Default, Clone)]
pub struct BarHistory {
    bars: HashMap<String, Vec<Bar>>,
}

impl BarHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every bar of an emitted batch.
    pub fn record(&mut self, batch: &BarBatch) {
        for (ticker, bar) in &batch.bars {
            self.bars.entry(ticker.clone()).or_default().push(bar.clone());
        }
    }

    pub fn latest(&self, ticker: &str) -> Option<&Bar> {
        self.bars.get(ticker).and_then(|v| v.last())
    }

    pub fn latest_n(&self, ticker: &str, n: usize) -> &[Bar] {
        match self.bars.get(ticker) {
            Some(v) => &v[v.len().saturating_sub(n)..],
            None => &[],
        }
    }
}
