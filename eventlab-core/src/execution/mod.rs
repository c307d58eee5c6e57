//! Execution simulation: turn ORDER events into fills or rejections.
//!
//! A rejection is an expected outcome (no bar for the ticker this tick, an
//! order type the simulator does not model). The driver reports it to the
//! portfolio and keeps going.

pub mod simple;

pub use simple::SimpleExecution;

use crate::domain::{OrderId, OrderType};
use crate::event::{FillEvent, OrderEvent};
use crate::feed::BarFeed;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an order could not be filled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderRejection {
    #[error("no bar for {ticker} in the current batch")]
    NoMarketData { ticker: String },

    #[error("unsupported order type {0:?}")]
    UnsupportedOrderType(OrderType),
}

/// Result of simulating one order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Filled(FillEvent),
    Rejected {
        order_id: OrderId,
        reason: OrderRejection,
    },
}

/// Broker commission schedule.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CommissionModel {
    #[default]
    Zero,
    /// Fixed fee per fill.
    Flat(f64),
    /// `rate` per share, never less than `minimum` per fill.
    PerShare { rate: f64, minimum: f64 },
}

impl CommissionModel {
    pub fn compute(&self, quantity: u64) -> f64 {
        match *self {
            CommissionModel::Zero => 0.0,
            CommissionModel::Flat(fee) => fee,
            CommissionModel::PerShare { rate, minimum } => (rate * quantity as f64).max(minimum),
        }
    }
}

/// Fills orders against the feed.
pub trait ExecutionSimulator: Send {
    fn execute(&mut self, order: &OrderEvent, feed: &dyn BarFeed) -> ExecutionOutcome;

    fn name(&self) -> &str;
}
