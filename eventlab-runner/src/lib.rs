//! EventLab Runner — backtest orchestration on top of `eventlab-core`.
//!
//! This crate provides:
//! - TOML configuration with validation and deterministic run ids
//! - CSV bar loading into a bar feed
//! - CSV and JSON result sinks
//! - Equity-curve metrics
//! - The `run_backtest` entry point and result export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sink;

pub use config::{BacktestConfig, ConfigError, OutputFormat};
pub use data_loader::{CsvBarFeed, LoadError, LoadOptions};
pub use metrics::PerformanceMetrics;
pub use runner::{run_backtest, BacktestResult, RunError, SCHEMA_VERSION};
pub use sink::{CsvSink, JsonSink};
