//! EventLab Core — event-driven backtesting engine.
//!
//! This crate contains:
//! - Domain types (bars, orders, positions, OwnedAsset accounting, snapshots)
//! - The event taxonomy and the FIFO event queue
//! - The blotter (order lifecycle) and the portfolio state machine
//! - Pluggable roles: bar feeds, strategies, sizers, execution, result sinks
//! - The backtest driver that ties them together

pub mod domain;
pub mod engine;
pub mod event;
pub mod execution;
pub mod feed;
pub mod persistence;
pub mod sizers;
pub mod strategy;

pub use engine::{Backtest, DriverState, EngineError, Portfolio, RunSummary};
