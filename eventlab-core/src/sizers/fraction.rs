//! Fixed-fraction sizer: commit a fraction of free cash per trade.

use crate::event::SignalEvent;
use crate::sizers::{whole_shares, Sizer};

#[derive(Debug, Clone, PartialEq)]
pub struct FixedFraction {
    fraction: f64,
}

impl FixedFraction {
    /// `fraction` must lie in (0, 1].
    pub fn new(fraction: f64) -> Option<Self> {
        (fraction > 0.0 && fraction <= 1.0).then_some(Self { fraction })
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

impl Sizer for FixedFraction {
    fn size(&self, signal: &SignalEvent, price: f64, cash: f64) -> u64 {
        if !(price.is_finite() && price > 0.0) || cash <= 0.0 {
            return 0;
        }
        whole_shares(cash * self.fraction * signal.strength / price)
    }

    fn name(&self) -> &str {
        "FixedFraction"
    }
}
