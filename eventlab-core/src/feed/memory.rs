//! In-memory bar feed, for tests and for loaders that read everything up front.

use super::{BarFeed, BarHistory, FeedError};
use crate::domain::{Bar, BarBatch};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Replays a fixed set of bars, one timestamp per batch.
#[derive(Debug)]
pub struct InMemoryBarFeed {
    name: String,
    tickers: Vec<String>,
    pending: VecDeque<BarBatch>,
    current: Option<BarBatch>,
    history: BarHistory,
}

impl InMemoryBarFeed {
    /// Group bars by timestamp. Input order does not matter; two bars for the
    /// same ticker and timestamp are an error, as is any malformed bar.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Result<Self, FeedError> {
        let mut grouped: BTreeMap<_, BarBatch> = BTreeMap::new();
        let mut tickers = BTreeSet::new();

        for bar in bars {
            bar.validate()?;
            tickers.insert(bar.ticker.clone());
            let batch = grouped
                .entry(bar.timestamp)
                .or_insert_with(|| BarBatch::new(bar.timestamp));
            if batch.bars.contains_key(&bar.ticker) {
                return Err(FeedError::Duplicate {
                    ticker: bar.ticker,
                    timestamp: bar.timestamp.to_string(),
                });
            }
            batch.bars.insert(bar.ticker.clone(), bar);
        }

        Ok(Self {
            name: "memory".to_string(),
            tickers: tickers.into_iter().collect(),
            pending: grouped.into_values().collect(),
            current: None,
            history: BarHistory::new(),
        })
    }

    /// Replay pre-built batches as given. Timestamps must strictly increase.
    pub fn from_batches(batches: Vec<BarBatch>) -> Result<Self, FeedError> {
        let mut tickers = BTreeSet::new();
        let mut last = None;
        for batch in &batches {
            if let Some(prev) = last {
                if batch.timestamp <= prev {
                    let ticker = batch.bars.keys().next().cloned().unwrap_or_default();
                    return Err(FeedError::OutOfOrder {
                        ticker,
                        timestamp: batch.timestamp.to_string(),
                    });
                }
            }
            last = Some(batch.timestamp);
            for bar in batch.bars.values() {
                bar.validate()?;
                tickers.insert(bar.ticker.clone());
            }
        }

        Ok(Self {
            name: "memory".to_string(),
            tickers: tickers.into_iter().collect(),
            pending: batches.into(),
            current: None,
            history: BarHistory::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Batches not yet handed out.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl BarFeed for InMemoryBarFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn tickers(&self) -> Vec<String> {
        self.tickers.clone()
    }

    fn next_batch(&mut self) -> Result<Option<BarBatch>, FeedError> {
        let Some(batch) = self.pending.pop_front() else {
            return Ok(None);
        };
        self.history.record(&batch);
        self.current = Some(batch.clone());
        Ok(Some(batch))
    }

    fn current_batch(&self) -> Option<&BarBatch> {
        self.current.as_ref()
    }

    fn latest_bar(&self, ticker: &str) -> Option<&Bar> {
        self.history.latest(ticker)
    }

    fn latest_bars(&self, ticker: &str, n: usize) -> &[Bar] {
        self.history.latest_n(ticker, n)
    }
}
