//! OHLCV bars and per-tick batches.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons a bar is refused at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar for {ticker} at {timestamp} has a non-finite or non-positive price")]
    InvalidPrice {
        ticker: String,
        timestamp: NaiveDateTime,
    },

    #[error("bar for {ticker} at {timestamp} is inconsistent (high/low do not bracket open/close)")]
    Inconsistent {
        ticker: String,
        timestamp: NaiveDateTime,
    },

    #[error("bar has an empty ticker")]
    EmptyTicker,
}

/// OHLCV observation for a single ticker at a single timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Build a bar, rejecting malformed prices.
    pub fn new(
        ticker: impl Into<String>,
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, BarError> {
        let bar = Self {
            ticker: ticker.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Check that prices are finite, positive, and that high/low bracket open/close.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.ticker.is_empty() {
            return Err(BarError::EmptyTicker);
        }
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BarError::InvalidPrice {
                ticker: self.ticker.clone(),
                timestamp: self.timestamp,
            });
        }
        let sane = self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close;
        if !sane {
            return Err(BarError::Inconsistent {
                ticker: self.ticker.clone(),
                timestamp: self.timestamp,
            });
        }
        Ok(())
    }
}

/// Every bar observed at one tick, keyed by ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarBatch {
    pub timestamp: NaiveDateTime,
    pub bars: BTreeMap<String, Bar>,
}

impl BarBatch {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            bars: BTreeMap::new(),
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&Bar> {
        self.bars.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
