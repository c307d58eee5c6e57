//! Position Sizers — determine trade quantity
//!
//! Sizers translate a signal plus the current price and free cash into a share
//! count. They do not decide direction (that's the signal's job) and they do
//! not check liquidity (that's the portfolio's job).

pub mod fixed;
pub mod fraction;

pub use fixed::FixedSizer;
pub use fraction::FixedFraction;

use crate::domain::MAX_SHARES;
use crate::event::SignalEvent;

/// Position sizing policy.
pub trait Sizer: Send + Sync {
    /// Whole shares to trade for `signal` at `price` with `cash` available.
    ///
    /// Returns 0 when no trade should be made.
    fn size(&self, signal: &SignalEvent, price: f64, cash: f64) -> u64;

    /// Sizer name for logging
    fn name(&self) -> &str;
}

/// Round a fractional share count down to whole shares, capped at
/// [`MAX_SHARES`]. NaN and non-positive counts size to zero.
pub fn whole_shares(shares: f64) -> u64 {
    if shares.is_nan() || shares <= 0.0 {
        return 0;
    }
    let floored = shares.floor();
    if floored >= MAX_SHARES as f64 {
        MAX_SHARES
    } else {
        floored as u64
    }
}
