//! Portfolio snapshots, one per bar.

use super::owned_asset::OwnedAsset;
use super::position::PositionSide;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One held position as it stood when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub position: PositionSide,
    pub shares_owned: u64,
    pub average_share_price_paid: f64,
    pub latest_price: f64,
    pub total_position_cost: f64,
    pub total_position_value: f64,
}

impl HoldingSnapshot {
    pub fn unrealized_pnl(&self) -> f64 {
        self.total_position_value + self.total_position_cost
    }
}

impl From<&OwnedAsset> for HoldingSnapshot {
    fn from(asset: &OwnedAsset) -> Self {
        Self {
            position: asset.position(),
            shares_owned: asset.shares_owned(),
            average_share_price_paid: asset.average_share_price_paid(),
            latest_price: asset.latest_price(),
            total_position_cost: asset.total_position_cost(),
            total_position_value: asset.total_position_value(),
        }
    }
}

/// Portfolio state at one MARKET event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    /// Sum of signed `total_position_value` over all holdings.
    pub market_value: f64,
    pub holdings: BTreeMap<String, HoldingSnapshot>,
}

impl PortfolioSnapshot {
    /// Cash plus signed market value.
    pub fn total_equity(&self) -> f64 {
        self.cash + self.market_value
    }

    /// Return on `initial_capital` as of this snapshot.
    pub fn return_on_investment(&self, initial_capital: f64) -> f64 {
        if initial_capital == 0.0 {
            return 0.0;
        }
        (self.total_equity() - initial_capital) / initial_capital
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot(cash: f64, market_value: f64) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            cash,
            market_value,
            holdings: BTreeMap::new(),
        }
    }

    #[test]
    fn equity_and_roi() {
        let s = snapshot(900.0, 130.0);
        assert_eq!(s.total_equity(), 1_030.0);
        assert!((s.return_on_investment(1_000.0) - 0.03).abs() < 1e-12);
        assert_eq!(s.return_on_investment(0.0), 0.0);
    }

    #[test]
    fn short_holdings_reduce_equity() {
        let s = snapshot(1_100.0, -120.0);
        assert_eq!(s.total_equity(), 980.0);
    }
}
