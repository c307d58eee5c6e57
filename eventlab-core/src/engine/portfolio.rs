//! Portfolio — cash, open positions, and the equity curve.
//!
//! Consumes three kinds of events:
//! - MARKET: mark every open position to the feed's latest bar and append a snapshot
//! - SIGNAL: size the trade, check liquidity, hand admissible orders to the blotter
//! - FILL: update or create the `OwnedAsset`, move cash, drop closed positions
//!
//! Snapshots are append-only. Nothing outside `update_timeindex` writes them.

use crate::domain::{
    HoldingSnapshot, OrderId, OrderSide, OrderType, OwnedAsset, OwnedAssetError,
    PortfolioSnapshot, PositionSide, SignalDirection, MAX_SHARES,
};
use crate::engine::blotter::{Blotter, BlotterError};
use crate::event::{EventQueue, FillEvent, MarketEvent, SignalEvent};
use crate::feed::BarFeed;
use crate::sizers::Sizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Fatal portfolio errors: malformed input or a broken order lifecycle.
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("initial capital must be positive and finite, got {0}")]
    InvalidCapital(f64),

    #[error("malformed fill on order {order_id}: {reason}")]
    InvalidFill { order_id: OrderId, reason: String },

    #[error(transparent)]
    Asset(#[from] OwnedAssetError),

    #[error(transparent)]
    Blotter(#[from] BlotterError),
}

/// Why a signal produced no order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Not enough free cash for the sized order.
    InsufficientLiquidity,
    /// The feed has never shown a bar for the ticker.
    NoPrice,
    /// The sizer returned zero shares.
    ZeroQuantity,
    /// EXIT signal for a ticker with no open position.
    NothingToExit,
    /// The sizer asked for more shares than an order can carry.
    OversizedOrder,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::InsufficientLiquidity => "insufficient liquidity",
            RejectionReason::NoPrice => "no price",
            RejectionReason::ZeroQuantity => "zero quantity",
            RejectionReason::NothingToExit => "nothing to exit",
            RejectionReason::OversizedOrder => "order too large",
        };
        write!(f, "{s}")
    }
}

/// A dropped signal and the cash picture at the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSignal {
    pub signal: SignalEvent,
    pub reason: RejectionReason,
    /// Signed cost of the sized order (0 when it never got that far).
    pub required_cash: f64,
    pub available_cash: f64,
}

/// Outcome of `update_signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDecision {
    Ordered(OrderId),
    Rejected(RejectionReason),
}

/// Aggregate portfolio state.
pub struct Portfolio {
    initial_capital: f64,
    cash: f64,
    /// Active position set: only tickers with shares_owned > 0.
    positions: BTreeMap<String, OwnedAsset>,
    snapshots: Vec<PortfolioSnapshot>,
    sizer: Box<dyn Sizer>,
    blotter: Blotter,
    rejected_signals: Vec<RejectedSignal>,
    total_commission: f64,
    realized_pnl: f64,
}

impl fmt::Debug for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portfolio")
            .field("initial_capital", &self.initial_capital)
            .field("cash", &self.cash)
            .field("positions", &self.positions.len())
            .field("snapshots", &self.snapshots.len())
            .field("sizer", &self.sizer.name())
            .finish()
    }
}

impl Portfolio {
    pub fn new(initial_capital: f64, sizer: Box<dyn Sizer>) -> Result<Self, PortfolioError> {
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(PortfolioError::InvalidCapital(initial_capital));
        }
        Ok(Self {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            snapshots: Vec::new(),
            sizer,
            blotter: Blotter::new(),
            rejected_signals: Vec::new(),
            total_commission: 0.0,
            realized_pnl: 0.0,
        })
    }

    /// Whether free cash covers acquiring `quantity` shares at `price`.
    ///
    /// Negative quantities (selling, shorting) raise cash and always pass.
    /// A buy to cover a short is positive and must be funded in full from
    /// free cash, even though it closes the position.
    pub fn check_liquidity(&self, price: f64, quantity: i64) -> bool {
        if quantity < 0 {
            return true;
        }
        price * quantity as f64 <= self.cash
    }

    /// Mark open positions to market and append one snapshot for `event`.
    pub fn update_timeindex(
        &mut self,
        event: &MarketEvent,
        feed: &dyn BarFeed,
    ) -> &PortfolioSnapshot {
        for (ticker, asset) in self.positions.iter_mut() {
            if let Some(bar) = feed.latest_bar(ticker) {
                asset.update_total_position_value(bar.close, bar.timestamp);
            }
        }

        let holdings: BTreeMap<String, HoldingSnapshot> = self
            .positions
            .iter()
            .map(|(ticker, asset)| (ticker.clone(), HoldingSnapshot::from(asset)))
            .collect();
        let snapshot = PortfolioSnapshot {
            timestamp: event.timestamp,
            cash: self.cash,
            market_value: self.market_value(),
            holdings,
        };
        debug!(
            timestamp = %snapshot.timestamp,
            equity = snapshot.total_equity(),
            positions = snapshot.holdings.len(),
            "snapshot"
        );
        self.snapshots.push(snapshot);
        // Just pushed, so never empty.
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Turn a signal into an order, or drop it.
    ///
    /// Admissible orders are placed on the blotter and their ORDER event is
    /// pushed onto `queue`. Dropped signals are recorded, never queued.
    pub fn update_signal(
        &mut self,
        signal: &SignalEvent,
        feed: &dyn BarFeed,
        queue: &mut EventQueue,
    ) -> Result<SignalDecision, PortfolioError> {
        let Some(price) = feed.latest_bar(&signal.ticker).map(|b| b.close) else {
            return Ok(self.reject(signal, RejectionReason::NoPrice, 0.0));
        };

        let (side, quantity) = match signal.direction {
            SignalDirection::Exit => match self.positions.get(&signal.ticker) {
                Some(asset) => (asset.position().closing_side(), asset.shares_owned()),
                None => return Ok(self.reject(signal, RejectionReason::NothingToExit, 0.0)),
            },
            SignalDirection::Long => (OrderSide::Buy, self.sizer.size(signal, price, self.cash)),
            SignalDirection::Short => (OrderSide::Sell, self.sizer.size(signal, price, self.cash)),
        };
        if quantity == 0 {
            return Ok(self.reject(signal, RejectionReason::ZeroQuantity, 0.0));
        }

        let Some(signed) = side.signed(quantity) else {
            return Ok(self.reject(signal, RejectionReason::OversizedOrder, 0.0));
        };
        // Sells skip the cash check, so the position ceiling is enforced here.
        if let Some(asset) = self.positions.get(&signal.ticker) {
            let grows = side != asset.position().closing_side();
            if grows && asset.shares_owned().saturating_add(quantity) > MAX_SHARES {
                return Ok(self.reject(signal, RejectionReason::OversizedOrder, 0.0));
            }
        }
        if !self.check_liquidity(price, signed) {
            let required = price * signed as f64;
            return Ok(self.reject(signal, RejectionReason::InsufficientLiquidity, required));
        }

        let order = self.blotter.place_order(
            &signal.ticker,
            quantity,
            side,
            OrderType::Market,
            signal.timestamp,
        )?;
        let id = order.order_id;
        queue.push(order);
        Ok(SignalDecision::Ordered(id))
    }

    /// Apply an executed fill to cash and positions.
    pub fn update_fill(&mut self, fill: &FillEvent) -> Result<(), PortfolioError> {
        validate_fill(fill)?;
        self.blotter.on_fill(fill)?;

        self.cash += fill.gross_proceeds() - fill.commission;
        self.total_commission += fill.commission;

        let Some(asset) = self.positions.get_mut(&fill.ticker) else {
            self.open_position(fill, fill.quantity)?;
            return Ok(());
        };

        let held = asset.shares_owned();
        let grows = fill.side != asset.position().closing_side();
        if grows || fill.quantity <= held {
            let outcome = asset.apply_fill(fill)?;
            self.realized_pnl += outcome.realized_pnl;
            if outcome.closed {
                self.close_position(&fill.ticker);
            }
            return Ok(());
        }

        // The fill crosses through zero: close what is held, reopen the rest
        // on the other side.
        let outcome = asset.close_out(fill.fill_price)?;
        self.realized_pnl += outcome.realized_pnl;
        self.close_position(&fill.ticker);
        self.open_position(fill, fill.quantity - held)
    }

    /// Record an execution rejection against the order.
    pub fn on_order_rejected(&mut self, order_id: OrderId, reason: &str) -> Result<(), PortfolioError> {
        self.blotter.on_reject(order_id, reason)?;
        Ok(())
    }

    fn open_position(&mut self, fill: &FillEvent, quantity: u64) -> Result<(), PortfolioError> {
        let side = PositionSide::opened_by(fill.side);
        let asset = OwnedAsset::new(
            fill.ticker.clone(),
            quantity,
            side,
            fill.fill_price,
            fill.timestamp,
        )?;
        info!(ticker = %fill.ticker, %side, shares = quantity, price = fill.fill_price, "position opened");
        self.positions.insert(fill.ticker.clone(), asset);
        Ok(())
    }

    fn close_position(&mut self, ticker: &str) {
        if let Some(asset) = self.positions.remove(ticker) {
            info!(
                ticker,
                side = %asset.position(),
                realized = asset.realized_pnl(),
                "position closed"
            );
        }
    }

    fn reject(
        &mut self,
        signal: &SignalEvent,
        reason: RejectionReason,
        required_cash: f64,
    ) -> SignalDecision {
        info!(
            ticker = %signal.ticker,
            direction = %signal.direction,
            %reason,
            required_cash,
            available_cash = self.cash,
            "signal dropped"
        );
        self.rejected_signals.push(RejectedSignal {
            signal: signal.clone(),
            reason,
            required_cash,
            available_cash: self.cash,
        });
        SignalDecision::Rejected(reason)
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Sum of signed position values (shorts count negative).
    pub fn market_value(&self) -> f64 {
        self.positions
            .values()
            .map(OwnedAsset::total_position_value)
            .sum()
    }

    /// Cash plus signed market value at the latest marks.
    pub fn equity(&self) -> f64 {
        self.cash + self.market_value()
    }

    pub fn positions(&self) -> &BTreeMap<String, OwnedAsset> {
        &self.positions
    }

    pub fn position(&self, ticker: &str) -> Option<&OwnedAsset> {
        self.positions.get(ticker)
    }

    pub fn has_position(&self, ticker: &str) -> bool {
        self.positions.contains_key(ticker)
    }

    /// The equity curve, oldest first.
    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    pub fn latest_snapshot(&self) -> Option<&PortfolioSnapshot> {
        self.snapshots.last()
    }

    pub fn rejected_signals(&self) -> &[RejectedSignal] {
        &self.rejected_signals
    }

    /// Signals dropped for lack of cash.
    pub fn liquidity_rejections(&self) -> usize {
        self.rejected_signals
            .iter()
            .filter(|r| r.reason == RejectionReason::InsufficientLiquidity)
            .count()
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn blotter(&self) -> &Blotter {
        &self.blotter
    }

    pub fn sizer_name(&self) -> &str {
        self.sizer.name()
    }
}

fn validate_fill(fill: &FillEvent) -> Result<(), PortfolioError> {
    let reason = if fill.quantity == 0 {
        Some("zero quantity".to_string())
    } else if fill.signed_quantity().is_none() {
        Some(format!("quantity {} is too large", fill.quantity))
    } else if !(fill.fill_price.is_finite() && fill.fill_price > 0.0) {
        Some(format!("price {}", fill.fill_price))
    } else if !(fill.commission.is_finite() && fill.commission >= 0.0) {
        Some(format!("commission {}", fill.commission))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(PortfolioError::InvalidFill {
            order_id: fill.order_id,
            reason,
        }),
        None => Ok(()),
    }
}
