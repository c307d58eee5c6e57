//! Backtesting engine — event-driven driver and the state it mutates.
//!
//! One bar at a time, the driver pushes a MARKET event and drains the queue:
//!
//! 1. MARKET: strategy emits signals, portfolio marks to market and snapshots
//! 2. SIGNAL: portfolio sizes and checks liquidity, the blotter opens an order
//! 3. ORDER: execution simulator fills or rejects it
//! 4. FILL: portfolio updates the position and cash

pub mod blotter;
pub mod driver;
pub mod portfolio;

pub use blotter::{Blotter, BlotterError};
pub use driver::{Backtest, DriverState, EngineError, RunSummary};
pub use portfolio::{Portfolio, PortfolioError, RejectedSignal, RejectionReason, SignalDecision};
