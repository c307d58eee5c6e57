//! Event taxonomy: the four event kinds that flow through one bar's causal chain.
//!
//! MARKET → SIGNAL → ORDER → FILL. Events are immutable once built; the driver
//! dispatches on them with an exhaustive match.

pub mod queue;

pub use queue::{EventQueue, QueueEmpty};

use crate::domain::{OrderId, OrderSide, OrderType, SignalDirection};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A new bar batch is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub timestamp: NaiveDateTime,
}

/// A strategy's trading decision for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub ticker: String,
    pub direction: SignalDirection,
    /// Conviction in [0, 1]; scales notional and fractional sizers.
    pub strength: f64,
    pub timestamp: NaiveDateTime,
}

impl SignalEvent {
    pub fn new(
        ticker: impl Into<String>,
        direction: SignalDirection,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            direction,
            strength: 1.0,
            timestamp,
        }
    }

    /// Clamped to [0, 1]. NaN means no conviction.
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        };
        self
    }
}

/// An order the blotter has accepted and wants executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub ticker: String,
    pub quantity: u64,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub timestamp: NaiveDateTime,
}

/// Confirmation that an order executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub order_id: OrderId,
    pub ticker: String,
    pub quantity: u64,
    pub side: OrderSide,
    pub fill_price: f64,
    pub commission: f64,
    pub timestamp: NaiveDateTime,
}

impl FillEvent {
    /// Share count with the sign of the side: positive for buys. `None` for
    /// quantities no order can carry.
    pub fn signed_quantity(&self) -> Option<i64> {
        self.side.signed(self.quantity)
    }

    /// Cash moved by the fill before commission: negative for buys.
    pub fn gross_proceeds(&self) -> f64 {
        -(self.side.sign() as f64) * self.quantity as f64 * self.fill_price
    }
}

/// Closed set of events the driver understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Market(MarketEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Market(_) => EventKind::Market,
            Event::Signal(_) => EventKind::Signal,
            Event::Order(_) => EventKind::Order,
            Event::Fill(_) => EventKind::Fill,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            Event::Market(e) => e.timestamp,
            Event::Signal(e) => e.timestamp,
            Event::Order(e) => e.timestamp,
            Event::Fill(e) => e.timestamp,
        }
    }
}

/// Discriminant of an `Event`, for logging and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Market,
    Signal,
    Order,
    Fill,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Market => write!(f, "MARKET"),
            EventKind::Signal => write!(f, "SIGNAL"),
            EventKind::Order => write!(f, "ORDER"),
            EventKind::Fill => write!(f, "FILL"),
        }
    }
}

impl From<MarketEvent> for Event {
    fn from(e: MarketEvent) -> Self {
        Event::Market(e)
    }
}

impl From<SignalEvent> for Event {
    fn from(e: SignalEvent) -> Self {
        Event::Signal(e)
    }
}

impl From<OrderEvent> for Event {
    fn from(e: OrderEvent) -> Self {
        Event::Order(e)
    }
}

impl From<FillEvent> for Event {
    fn from(e: FillEvent) -> Self {
        Event::Fill(e)
    }
}
