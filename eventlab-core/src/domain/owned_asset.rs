//! OwnedAsset — one held position and its cost/value accounting.
//!
//! Sign convention (must hold after every fill and every mark-to-market):
//!
//! | side  | `total_position_cost`          | `total_position_value`       |
//! |-------|--------------------------------|------------------------------|
//! | LONG  | negative (cash went out)       | `+shares * latest_price`     |
//! | SHORT | positive (cash came in)        | `-shares * latest_price`     |
//!
//! so `total_position_value + total_position_cost` is always the unrealized P&L.
//! The two conventions live in separate pure functions, [`apply_long_fill`] and
//! [`apply_short_fill`], so each can be checked on its own.

use super::order::MAX_SHARES;
use super::position::{ParsePositionSideError, PositionSide};
use crate::event::FillEvent;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid input to position accounting. Always fatal: never coerced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OwnedAssetError {
    #[error("{ticker}: share quantity must be non-zero")]
    ZeroQuantity { ticker: String },

    #[error("{ticker}: invalid price {price}")]
    InvalidPrice { ticker: String, price: f64 },

    #[error("{ticker}: cannot remove {requested} shares, only {owned} owned")]
    Oversold {
        ticker: String,
        owned: u64,
        requested: u64,
    },

    #[error("{ticker}: {quantity} shares is more than a position can hold")]
    QuantityOverflow { ticker: String, quantity: u64 },

    #[error("fill for {got} applied to owned asset {expected}")]
    TickerMismatch { expected: String, got: String },

    #[error(transparent)]
    UnknownPositionSide(#[from] ParsePositionSideError),
}

/// The numeric state of a position, independent of identity and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionAccount {
    pub shares_owned: u64,
    pub average_share_price_paid: f64,
    pub latest_price: f64,
    pub total_position_cost: f64,
    pub total_position_value: f64,
    pub realized_pnl: f64,
}

/// Apply a signed share delta at `price` to a LONG account.
///
/// Positive deltas buy more: cost moves by the cash outflow and the average is
/// recomputed. Negative deltas sell: cost basis is released at the current
/// average, the difference to `price` is realized, and the average is kept.
/// The caller guarantees `-delta <= shares_owned`.
pub fn apply_long_fill(account: PositionAccount, delta: i64, price: f64) -> PositionAccount {
    let mut next = account;
    let qty = delta.unsigned_abs();
    if delta > 0 {
        next.total_position_cost -= price * qty as f64;
        next.shares_owned += qty;
        next.average_share_price_paid = -next.total_position_cost / next.shares_owned as f64;
    } else {
        debug_assert!(qty <= account.shares_owned);
        next.realized_pnl += (price - account.average_share_price_paid) * qty as f64;
        next.total_position_cost += account.average_share_price_paid * qty as f64;
        next.shares_owned -= qty;
        if next.shares_owned == 0 {
            next.total_position_cost = 0.0;
        }
    }
    next.latest_price = price;
    next.total_position_value = next.shares_owned as f64 * price;
    next
}

/// Apply a signed share delta at `price` to a SHORT account.
///
/// Positive deltas sell more short (cash inflow, cost grows positive).
/// Negative deltas buy to cover.
/// The caller guarantees `-delta <= shares_owned`.
pub fn apply_short_fill(account: PositionAccount, delta: i64, price: f64) -> PositionAccount {
    let mut next = account;
    let qty = delta.unsigned_abs();
    if delta > 0 {
        next.total_position_cost += price * qty as f64;
        next.shares_owned += qty;
        next.average_share_price_paid = next.total_position_cost / next.shares_owned as f64;
    } else {
        debug_assert!(qty <= account.shares_owned);
        next.realized_pnl += (account.average_share_price_paid - price) * qty as f64;
        next.total_position_cost -= account.average_share_price_paid * qty as f64;
        next.shares_owned -= qty;
        if next.shares_owned == 0 {
            next.total_position_cost = 0.0;
        }
    }
    next.latest_price = price;
    next.total_position_value = -(next.shares_owned as f64 * price);
    next
}

/// What a single `make_trade` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeOutcome {
    /// P&L booked by this trade (zero when adding to the position).
    pub realized_pnl: f64,
    /// `shares_owned` reached zero.
    pub closed: bool,
}

/// A position held in the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedAsset {
    ticker: String,
    position: PositionSide,
    purchase_time: NaiveDateTime,
    latest_price_time: NaiveDateTime,
    account: PositionAccount,
}

impl OwnedAsset {
    /// Open a position of `shares_owned` at `avg_share_price`.
    pub fn new(
        ticker: impl Into<String>,
        shares_owned: u64,
        position: PositionSide,
        avg_share_price: f64,
        purchase_time: NaiveDateTime,
    ) -> Result<Self, OwnedAssetError> {
        let ticker = ticker.into();
        if shares_owned == 0 {
            return Err(OwnedAssetError::ZeroQuantity { ticker });
        }
        check_price(&ticker, avg_share_price)?;
        let Ok(delta) = i64::try_from(shares_owned) else {
            return Err(OwnedAssetError::QuantityOverflow {
                ticker,
                quantity: shares_owned,
            });
        };

        let mut asset = Self {
            ticker,
            position,
            purchase_time,
            latest_price_time: purchase_time,
            account: PositionAccount::default(),
        };
        asset.apply_delta(delta, avg_share_price);
        Ok(asset)
    }

    /// Like [`OwnedAsset::new`] with the side given as text ("LONG" / "SHORT").
    pub fn with_side_str(
        ticker: impl Into<String>,
        shares_owned: u64,
        position: &str,
        avg_share_price: f64,
        purchase_time: NaiveDateTime,
    ) -> Result<Self, OwnedAssetError> {
        let position = position.parse::<PositionSide>()?;
        Self::new(ticker, shares_owned, position, avg_share_price, purchase_time)
    }

    /// Factory for the first fill on a ticker.
    pub fn from_fill(fill: &FillEvent, position: PositionSide) -> Result<Self, OwnedAssetError> {
        Self::new(
            fill.ticker.clone(),
            fill.quantity,
            position,
            fill.fill_price,
            fill.timestamp,
        )
    }

    /// Apply a signed share delta at `price_per_share`, updating the weighted
    /// average cost.
    ///
    /// Positive deltas grow the position, negative deltas shrink it. Removing
    /// more shares than are owned is an error; flipping sides is the
    /// portfolio's job.
    pub fn make_trade(
        &mut self,
        quantity_delta: i64,
        price_per_share: f64,
    ) -> Result<TradeOutcome, OwnedAssetError> {
        if quantity_delta == 0 {
            return Err(OwnedAssetError::ZeroQuantity {
                ticker: self.ticker.clone(),
            });
        }
        check_price(&self.ticker, price_per_share)?;
        if quantity_delta < 0 && quantity_delta.unsigned_abs() > self.account.shares_owned {
            return Err(OwnedAssetError::Oversold {
                ticker: self.ticker.clone(),
                owned: self.account.shares_owned,
                requested: quantity_delta.unsigned_abs(),
            });
        }
        if quantity_delta > 0 {
            let grown = self
                .account
                .shares_owned
                .saturating_add(quantity_delta.unsigned_abs());
            if grown > MAX_SHARES {
                return Err(OwnedAssetError::QuantityOverflow {
                    ticker: self.ticker.clone(),
                    quantity: grown,
                });
            }
        }

        let realized_before = self.account.realized_pnl;
        self.apply_delta(quantity_delta, price_per_share);
        Ok(TradeOutcome {
            realized_pnl: self.account.realized_pnl - realized_before,
            closed: self.account.shares_owned == 0,
        })
    }

    /// Apply a fill on this ticker, translating its side into a share delta.
    pub fn apply_fill(&mut self, fill: &FillEvent) -> Result<TradeOutcome, OwnedAssetError> {
        if fill.ticker != self.ticker {
            return Err(OwnedAssetError::TickerMismatch {
                expected: self.ticker.clone(),
                got: fill.ticker.clone(),
            });
        }
        let delta = self
            .position
            .share_delta(fill.side, fill.quantity)
            .ok_or_else(|| OwnedAssetError::QuantityOverflow {
                ticker: self.ticker.clone(),
                quantity: fill.quantity,
            })?;
        let outcome = self.make_trade(delta, fill.fill_price)?;
        self.latest_price_time = fill.timestamp;
        Ok(outcome)
    }

    /// Remove every held share at `price_per_share`.
    pub fn close_out(&mut self, price_per_share: f64) -> Result<TradeOutcome, OwnedAssetError> {
        // make_trade keeps shares_owned within MAX_SHARES.
        let held = i64::try_from(self.account.shares_owned).map_err(|_| {
            OwnedAssetError::QuantityOverflow {
                ticker: self.ticker.clone(),
                quantity: self.account.shares_owned,
            }
        })?;
        self.make_trade(-held, price_per_share)
    }

    /// Mark to market at `latest_price`.
    pub fn update_total_position_value(&mut self, latest_price: f64, price_time: NaiveDateTime) {
        debug_assert!(latest_price.is_finite() && latest_price > 0.0);
        self.account.latest_price = latest_price;
        self.latest_price_time = price_time;
        let gross = self.account.shares_owned as f64 * latest_price;
        self.account.total_position_value = match self.position {
            PositionSide::Long => gross,
            PositionSide::Short => -gross,
        };
    }

    fn apply_delta(&mut self, delta: i64, price: f64) {
        self.account = match self.position {
            PositionSide::Long => apply_long_fill(self.account, delta, price),
            PositionSide::Short => apply_short_fill(self.account, delta, price),
        };
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn position(&self) -> PositionSide {
        self.position
    }

    pub fn shares_owned(&self) -> u64 {
        self.account.shares_owned
    }

    pub fn average_share_price_paid(&self) -> f64 {
        self.account.average_share_price_paid
    }

    pub fn latest_price(&self) -> f64 {
        self.account.latest_price
    }

    pub fn latest_price_time(&self) -> NaiveDateTime {
        self.latest_price_time
    }

    pub fn purchase_time(&self) -> NaiveDateTime {
        self.purchase_time
    }

    pub fn total_position_cost(&self) -> f64 {
        self.account.total_position_cost
    }

    pub fn total_position_value(&self) -> f64 {
        self.account.total_position_value
    }

    pub fn realized_pnl(&self) -> f64 {
        self.account.realized_pnl
    }

    pub fn account(&self) -> &PositionAccount {
        &self.account
    }

    pub fn is_closed(&self) -> bool {
        self.account.shares_owned == 0
    }

    /// Unsigned market value of the shares held.
    pub fn market_value(&self) -> f64 {
        self.account.shares_owned as f64 * self.account.latest_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.account.total_position_value + self.account.total_position_cost
    }

    /// Unrealized P&L relative to the capital committed.
    pub fn return_on_investment(&self) -> f64 {
        let committed = self.account.total_position_cost.abs();
        if committed == 0.0 {
            0.0
        } else {
            self.unrealized_pnl() / committed
        }
    }
}

fn check_price(ticker: &str, price: f64) -> Result<(), OwnedAssetError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(OwnedAssetError::InvalidPrice {
            ticker: ticker.to_string(),
            price,
        })
    }
}
