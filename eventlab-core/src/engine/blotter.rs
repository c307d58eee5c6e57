//! The blotter: order ledger between signal sizing and execution.
//!
//! The blotter owns every order from placement until it reaches a terminal
//! status. It manages:
//! - Order ID allocation and lookup (open + historical)
//! - State transitions (Open → Filled / Cancelled / Rejected)
//! - At-most-one terminal transition per order
//! - Audit trail for every state transition
//!
//! It does NOT price fills; that is the execution simulator's job.

use crate::domain::{
    IdGen, Order, OrderAuditEntry, OrderId, OrderSide, OrderStatus, OrderType, MAX_SHARES,
};
use crate::event::{FillEvent, OrderEvent};
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

/// Errors from blotter operations. All of them indicate a defect upstream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlotterError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} is not open (status: {1})")]
    OrderNotOpen(OrderId, OrderStatus),

    #[error("fill of {requested} on order {id} exceeds remaining {remaining}")]
    Overfill {
        id: OrderId,
        remaining: u64,
        requested: u64,
    },

    #[error("fill for {ticker} {side} does not match order {id}")]
    FillMismatch {
        id: OrderId,
        ticker: String,
        side: OrderSide,
    },

    #[error("cannot place an order for zero shares of {0}")]
    ZeroQuantity(String),

    #[error("order for {quantity} shares of {ticker} exceeds the largest order size")]
    QuantityOverflow { ticker: String, quantity: u64 },
}

/// The blotter: stores all orders and manages their lifecycle.
#[derive(Debug, Default)]
pub struct Blotter {
    /// All open/historical orders keyed by ID.
    orders: HashMap<OrderId, Order>,

    /// IDs still awaiting a terminal transition.
    open: BTreeSet<OrderId>,

    id_gen: IdGen,

    /// Complete audit trail of every state transition.
    audit_trail: Vec<OrderAuditEntry>,
}

impl Blotter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an OPEN order and return the ORDER event announcing it.
    pub fn place_order(
        &mut self,
        ticker: &str,
        quantity: u64,
        side: OrderSide,
        order_type: OrderType,
        timestamp: NaiveDateTime,
    ) -> Result<OrderEvent, BlotterError> {
        if quantity == 0 {
            return Err(BlotterError::ZeroQuantity(ticker.to_string()));
        }
        if quantity > MAX_SHARES {
            return Err(BlotterError::QuantityOverflow {
                ticker: ticker.to_string(),
                quantity,
            });
        }

        let id = self.id_gen.next_order_id();
        let order = Order {
            id,
            ticker: ticker.to_string(),
            side,
            order_type,
            quantity,
            filled_quantity: 0,
            status: OrderStatus::Open,
            created_at: timestamp,
        };
        debug!(order = %id, ticker, %side, quantity, "order placed");
        self.orders.insert(id, order);
        self.open.insert(id);

        Ok(OrderEvent {
            order_id: id,
            ticker: ticker.to_string(),
            quantity,
            side,
            order_type,
            timestamp,
        })
    }

    /// Record a fill against its order.
    ///
    /// Returns `Ok(true)` once the order is fully filled. A fill on an order
    /// that already reached a terminal status is refused, so two fills can
    /// never both complete the same order.
    pub fn on_fill(&mut self, fill: &FillEvent) -> Result<bool, BlotterError> {
        let order = self.open_order_mut(fill.order_id)?;

        if order.ticker != fill.ticker || order.side != fill.side {
            return Err(BlotterError::FillMismatch {
                id: fill.order_id,
                ticker: fill.ticker.clone(),
                side: fill.side,
            });
        }
        let remaining = order.remaining_quantity();
        if fill.quantity > remaining {
            return Err(BlotterError::Overfill {
                id: fill.order_id,
                remaining,
                requested: fill.quantity,
            });
        }

        order.filled_quantity += fill.quantity;
        let fully_filled = order.remaining_quantity() == 0;
        if fully_filled {
            self.transition(fill.order_id, OrderStatus::Filled);
        }
        Ok(fully_filled)
    }

    /// Mark an order REJECTED by the execution simulator.
    pub fn on_reject(&mut self, order_id: OrderId, reason: &str) -> Result<(), BlotterError> {
        self.open_order_mut(order_id)?;
        self.transition(
            order_id,
            OrderStatus::Rejected {
                reason: reason.to_string(),
            },
        );
        Ok(())
    }

    /// Cancel an open order.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<(), BlotterError> {
        self.open_order_mut(order_id)?;
        self.transition(order_id, OrderStatus::Cancelled);
        Ok(())
    }

    /// Get an order by ID (open or historical).
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Count of orders ever placed.
    pub fn total_count(&self) -> usize {
        self.orders.len()
    }

    pub fn audit_trail(&self) -> &[OrderAuditEntry] {
        &self.audit_trail
    }

    fn open_order_mut(&mut self, id: OrderId) -> Result<&mut Order, BlotterError> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or(BlotterError::OrderNotFound(id))?;
        if !order.is_open() {
            return Err(BlotterError::OrderNotOpen(id, order.status.clone()));
        }
        Ok(order)
    }

    fn transition(&mut self, id: OrderId, to_status: OrderStatus) {
        if let Some(order) = self.orders.get_mut(&id) {
            let from_status = std::mem::replace(&mut order.status, to_status.clone());
            debug!(order = %id, from = %from_status, to = %to_status, "order transition");
            self.audit_trail.push(OrderAuditEntry {
                order_id: id,
                from_status,
                to_status,
            });
        }
        self.open.remove(&id);
    }
}
