//! Backtest runner: wires a validated config into a driver and collects
//! the result.
//!
//! `run_backtest` is the single entry point used by the CLI. The `build_*`
//! helpers are public so callers can swap one role and keep the rest.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use eventlab_core::domain::{HoldingSnapshot, RunId};
use eventlab_core::engine::{
    Backtest, EngineError, Portfolio, PortfolioError, RejectedSignal, RunSummary,
};
use eventlab_core::execution::{ExecutionSimulator, SimpleExecution};
use eventlab_core::feed::{BarFeed, FeedError, SyntheticBarFeed, SyntheticConfig};
use eventlab_core::persistence::ResultSink;
use eventlab_core::sizers::{FixedFraction, FixedSizer, Sizer};
use eventlab_core::strategy::{BuyAndHold, MovingAverageCrossover, Strategy};

use crate::config::{
    BacktestConfig, ConfigError, DataConfig, OutputFormat, SizerConfig, StrategyConfig,
};
use crate::data_loader::{CsvBarFeed, LoadError, LoadOptions};
use crate::metrics::{equity_curve, PerformanceMetrics};
use crate::sink::{CsvSink, JsonSink};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("portfolio error: {0}")]
    Portfolio(#[from] PortfolioError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),
    #[error("invalid sizer: {0}")]
    InvalidSizer(String),
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything a finished run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub strategy: String,
    pub sizer: String,
    pub feed: String,
    pub tickers: Vec<String>,
    pub initial_capital: f64,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub summary: RunSummary,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<f64>,
    pub final_cash: f64,
    pub final_holdings: BTreeMap<String, HoldingSnapshot>,
    pub rejected_signals: Vec<RejectedSignal>,
    /// Directory the sink wrote to, if any.
    pub output_dir: Option<PathBuf>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

pub fn build_feed(config: &BacktestConfig) -> Result<Box<dyn BarFeed>, RunError> {
    let bt = &config.backtest;
    match &config.data {
        DataConfig::Csv { path } => {
            let opts = LoadOptions {
                start: bt.start_date,
                end: bt.end_date,
            };
            Ok(Box::new(CsvBarFeed::load(path, &bt.tickers, &opts)?))
        }
        DataConfig::Synthetic {
            bars,
            seed,
            start_price,
            volatility,
        } => {
            let defaults = SyntheticConfig::default();
            let feed = SyntheticBarFeed::new(SyntheticConfig {
                tickers: bt.tickers.clone(),
                bars: *bars,
                seed: *seed,
                start_price: *start_price,
                volatility: *volatility,
                start_date: bt.start_date.unwrap_or(defaults.start_date),
            })?;
            Ok(Box::new(feed))
        }
    }
}

pub fn build_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy>, RunError> {
    match *config {
        StrategyConfig::BuyAndHold => Ok(Box::new(BuyAndHold::new())),
        StrategyConfig::MaCrossover {
            fast,
            slow,
            allow_short,
        } => MovingAverageCrossover::new(fast, slow, allow_short)
            .map(|s| Box::new(s) as Box<dyn Strategy>)
            .ok_or_else(|| RunError::InvalidStrategy(format!("fast={fast} slow={slow}"))),
    }
}

pub fn build_sizer(config: &SizerConfig) -> Result<Box<dyn Sizer>, RunError> {
    match *config {
        SizerConfig::FixedQuantity { quantity } => Ok(Box::new(FixedSizer::quantity(quantity))),
        SizerConfig::FixedNotional { amount } => Ok(Box::new(FixedSizer::notional(amount))),
        SizerConfig::FixedFraction { fraction } => FixedFraction::new(fraction)
            .map(|s| Box::new(s) as Box<dyn Sizer>)
            .ok_or_else(|| RunError::InvalidSizer(format!("fraction={fraction}"))),
    }
}

pub fn build_execution(config: &BacktestConfig) -> Box<dyn ExecutionSimulator> {
    Box::new(
        SimpleExecution::new(config.execution.commission_model())
            .with_slippage_bps(config.execution.slippage_bps),
    )
}

fn build_sink(config: &BacktestConfig) -> Option<Box<dyn ResultSink>> {
    let dir = config.output.dir.clone();
    match config.output.format {
        OutputFormat::Csv => Some(Box::new(CsvSink::new(dir))),
        OutputFormat::Json => Some(Box::new(JsonSink::new(dir))),
        OutputFormat::None => None,
    }
}

/// Run one backtest end to end.
pub fn run_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;

    let feed = build_feed(config)?;
    let strategy = build_strategy(&config.strategy)?;
    let sizer = build_sizer(&config.sizer)?;
    let execution = build_execution(config);
    let portfolio = Portfolio::new(config.backtest.initial_capital, sizer)?;

    let feed_name = feed.name().to_string();
    let strategy_name = strategy.name().to_string();
    info!(
        run_id = %run_id,
        feed = %feed_name,
        strategy = %strategy_name,
        tickers = config.backtest.tickers.len(),
        "starting backtest"
    );

    let mut backtest = Backtest::new(feed, strategy, portfolio, execution);
    let output_dir = match build_sink(config) {
        Some(sink) => {
            backtest = backtest.with_sink(sink, run_id.clone());
            Some(config.output.dir.join(run_id.as_str()))
        }
        None => None,
    };

    let summary = backtest.run()?;
    let portfolio = backtest.into_portfolio();
    let metrics = PerformanceMetrics::compute(&portfolio);

    let snapshots = portfolio.snapshots();
    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        strategy: strategy_name,
        sizer: portfolio.sizer_name().to_string(),
        feed: feed_name,
        tickers: config.backtest.tickers.clone(),
        initial_capital: portfolio.initial_capital(),
        start: snapshots.first().map(|s| s.timestamp),
        end: snapshots.last().map(|s| s.timestamp),
        summary,
        metrics,
        equity_curve: equity_curve(snapshots),
        final_cash: portfolio.cash(),
        final_holdings: portfolio
            .positions()
            .iter()
            .map(|(t, a)| (t.clone(), HoldingSnapshot::from(a)))
            .collect(),
        rejected_signals: portfolio.rejected_signals().to_vec(),
        output_dir,
    })
}
