//! Simple execution: market orders fill in full at the current close.

use super::{CommissionModel, ExecutionOutcome, ExecutionSimulator, OrderRejection};
use crate::domain::{OrderSide, OrderType};
use crate::event::{FillEvent, OrderEvent};
use crate::feed::BarFeed;
use tracing::warn;

/// Fills at the close of the ticker's bar in the current batch, moved
/// against the trader by `slippage_bps`.
#[derive(Debug, Clone, Default)]
pub struct SimpleExecution {
    commission: CommissionModel,
    slippage_bps: f64,
}

impl SimpleExecution {
    pub fn new(commission: CommissionModel) -> Self {
        Self {
            commission,
            slippage_bps: 0.0,
        }
    }

    pub fn with_slippage_bps(mut self, bps: f64) -> Self {
        self.slippage_bps = bps.max(0.0);
        self
    }

    fn fill_price(&self, close: f64, side: OrderSide) -> f64 {
        let slip = close * self.slippage_bps / 10_000.0;
        match side {
            OrderSide::Buy => close + slip,
            OrderSide::Sell => close - slip,
        }
    }
}

impl ExecutionSimulator for SimpleExecution {
    fn execute(&mut self, order: &OrderEvent, feed: &dyn BarFeed) -> ExecutionOutcome {
        let reject = |reason: OrderRejection| {
            warn!(order = %order.order_id, ticker = %order.ticker, %reason, "order rejected");
            ExecutionOutcome::Rejected {
                order_id: order.order_id,
                reason,
            }
        };

        if !matches!(order.order_type, OrderType::Market) {
            return reject(OrderRejection::UnsupportedOrderType(order.order_type));
        }
        let Some(bar) = feed.current_batch().and_then(|b| b.get(&order.ticker)) else {
            return reject(OrderRejection::NoMarketData {
                ticker: order.ticker.clone(),
            });
        };

        ExecutionOutcome::Filled(FillEvent {
            order_id: order.order_id,
            ticker: order.ticker.clone(),
            quantity: order.quantity,
            side: order.side,
            fill_price: self.fill_price(bar.close, order.side),
            commission: self.commission.compute(order.quantity),
            timestamp: bar.timestamp,
        })
    }

    fn name(&self) -> &str {
        "SimpleExecution"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, OrderId};
    use crate::feed::{BarFeed, InMemoryBarFeed};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn feed() -> InMemoryBarFeed {
        let mut feed = InMemoryBarFeed::from_bars(vec![
            Bar::new("A", ts(2), 99.0, 101.0, 98.0, 100.0, 10).unwrap(),
            Bar::new("B", ts(2), 50.0, 50.0, 50.0, 50.0, 10).unwrap(),
            Bar::new("A", ts(3), 100.0, 101.0, 99.0, 100.0, 10).unwrap(),
        ])
        .unwrap();
        feed.next_batch().unwrap();
        feed
    }

    fn order(ticker: &str, side: OrderSide, order_type: OrderType) -> OrderEvent {
        OrderEvent {
            order_id: OrderId(1),
            ticker: ticker.into(),
            quantity: 10,
            side,
            order_type,
            timestamp: ts(2),
        }
    }

    #[test]
    fn fills_market_order_at_close() {
        let mut exec = SimpleExecution::new(CommissionModel::Flat(1.0));
        let outcome = exec.execute(&order("A", OrderSide::Buy, OrderType::Market), &feed());
        let ExecutionOutcome::Filled(fill) = outcome else {
            panic!("expected fill");
        };
        assert_eq!(fill.fill_price, 100.0);
        assert_eq!(fill.quantity, 10);
        assert_eq!(fill.commission, 1.0);
        assert_eq!(fill.timestamp, ts(2));
    }

    #[test]
    fn slippage_moves_against_trader() {
        let mut exec = SimpleExecution::new(CommissionModel::Zero).with_slippage_bps(10.0);
        let feed = feed();
        let buy = exec.execute(&order("A", OrderSide::Buy, OrderType::Market), &feed);
        let sell = exec.execute(&order("A", OrderSide::Sell, OrderType::Market), &feed);
        match (buy, sell) {
            (ExecutionOutcome::Filled(b), ExecutionOutcome::Filled(s)) => {
                assert!((b.fill_price - 100.1).abs() < 1e-9);
                assert!((s.fill_price - 99.9).abs() < 1e-9);
            }
            other => panic!("expected two fills, got {other:?}"),
        }
    }

    #[test]
    fn rejects_ticker_missing_from_current_batch() {
        let mut feed = feed();
        feed.next_batch().unwrap();
        let mut exec = SimpleExecution::default();
        let outcome = exec.execute(&order("B", OrderSide::Buy, OrderType::Market), &feed);
        assert_eq!(
            outcome,
            ExecutionOutcome::Rejected {
                order_id: OrderId(1),
                reason: OrderRejection::NoMarketData {
                    ticker: "B".into()
                },
            }
        );
    }

    #[test]
    fn rejects_limit_orders() {
        let mut exec = SimpleExecution::default();
        let limit = OrderType::Limit { limit_price: 90.0 };
        let outcome = exec.execute(&order("A", OrderSide::Buy, limit), &feed());
        assert!(matches!(
            outcome,
            ExecutionOutcome::Rejected {
                reason: OrderRejection::UnsupportedOrderType(_),
                ..
            }
        ));
    }
}
