//! Performance metrics computed from the portfolio's equity curve.
//!
//! Every metric is a pure function of the curve; the aggregate struct just
//! bundles them with a few end-of-run portfolio figures.

use eventlab_core::domain::PortfolioSnapshot;
use eventlab_core::engine::Portfolio;
use serde::{Deserialize, Serialize};

/// Bars per year used to annualize the Sharpe ratio.
pub const PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub final_equity: f64,
    /// Return on the initial capital at the last snapshot.
    pub roi: f64,
    pub total_commission: f64,
    pub realized_pnl: f64,
    pub snapshot_count: usize,
}

impl PerformanceMetrics {
    pub fn compute(portfolio: &Portfolio) -> Self {
        let curve = equity_curve(portfolio.snapshots());
        let roi = portfolio
            .latest_snapshot()
            .map_or(0.0, |s| s.return_on_investment(portfolio.initial_capital()));
        Self {
            total_return: total_return(&curve),
            max_drawdown: max_drawdown(&curve),
            sharpe: sharpe_ratio(&curve),
            final_equity: curve.last().copied().unwrap_or(portfolio.initial_capital()),
            roi,
            total_commission: portfolio.total_commission(),
            realized_pnl: portfolio.realized_pnl(),
            snapshot_count: curve.len(),
        }
    }
}

pub fn equity_curve(snapshots: &[PortfolioSnapshot]) -> Vec<f64> {
    snapshots.iter().map(PortfolioSnapshot::total_equity).collect()
}

/// (final - initial) / initial over the curve.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Maximum drawdown as a negative fraction (-0.15 is a 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio of per-bar returns, zero risk-free rate.
///
/// Returns 0.0 with fewer than two returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean / std * PERIODS_PER_YEAR.sqrt()
}

pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
