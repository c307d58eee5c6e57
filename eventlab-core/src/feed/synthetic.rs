//! Seeded random-walk bar feed.

use super::{BarFeed, BarHistory, FeedError};
use crate::domain::{Bar, BarBatch};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of the random walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub tickers: Vec<String>,
    /// Number of batches to produce.
    pub bars: usize,
    pub seed: u64,
    pub start_price: f64,
    /// Per-bar standard deviation of close-to-close returns.
    pub volatility: f64,
    pub start_date: NaiveDate,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            tickers: vec!["SYN".to_string()],
            bars: 252,
            seed: 42,
            start_price: 100.0,
            volatility: 0.02,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default(),
        }
    }
}

/// Generates one bar per ticker per day from a geometric random walk.
#[derive(Debug)]
pub struct SyntheticBarFeed {
    config: SyntheticConfig,
    rng: StdRng,
    last_close: Vec<f64>,
    emitted: usize,
    current: Option<BarBatch>,
    history: BarHistory,
}

impl SyntheticBarFeed {
    pub fn new(config: SyntheticConfig) -> Result<Self, FeedError> {
        if config.tickers.is_empty() {
            return Err(FeedError::InvalidConfig("no tickers".into()));
        }
        if !(config.start_price.is_finite() && config.start_price > 0.0) {
            return Err(FeedError::InvalidConfig(format!(
                "start_price must be positive, got {}",
                config.start_price
            )));
        }
        if !(0.0..0.5).contains(&config.volatility) {
            return Err(FeedError::InvalidConfig(format!(
                "volatility must be in [0, 0.5), got {}",
                config.volatility
            )));
        }

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            last_close: vec![config.start_price; config.tickers.len()],
            emitted: 0,
            current: None,
            history: BarHistory::new(),
            config,
        })
    }

    fn timestamp(&self, index: usize) -> NaiveDateTime {
        (self.config.start_date + Duration::days(index as i64))
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
    }

    /// Uniform draw scaled so its standard deviation equals `volatility`.
    fn shock(&mut self) -> f64 {
        let u: f64 = self.rng.gen_range(-1.0..1.0);
        u * self.config.volatility * 3f64.sqrt()
    }
}

impl BarFeed for SyntheticBarFeed {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn tickers(&self) -> Vec<String> {
        self.config.tickers.clone()
    }

    fn next_batch(&mut self) -> Result<Option<BarBatch>, FeedError> {
        if self.emitted >= self.config.bars {
            return Ok(None);
        }

        let timestamp = self.timestamp(self.emitted);
        let mut batch = BarBatch::new(timestamp);
        for i in 0..self.config.tickers.len() {
            let open = self.last_close[i];
            let close = open * (1.0 + self.shock());
            let high = open.max(close) * (1.0 + self.shock().abs() / 2.0);
            let low = open.min(close) * (1.0 - self.shock().abs() / 2.0);
            let volume = self.rng.gen_range(10_000..1_000_000);

            let ticker = self.config.tickers[i].clone();
            let bar = Bar::new(ticker.clone(), timestamp, open, high, low, close, volume)?;
            self.last_close[i] = close;
            batch.bars.insert(ticker, bar);
        }

        self.emitted += 1;
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
