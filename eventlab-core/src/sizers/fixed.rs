//! Fixed Position Sizer
//!
//! Simplest sizer: trade a fixed quantity or fixed notional amount.

use crate::event::SignalEvent;
use crate::sizers::{whole_shares, Sizer};

/// Fixed position sizer
///
/// Two modes:
/// 1. **Fixed Quantity**: always trade N shares (e.g., 100 shares per trade)
/// 2. **Fixed Notional**: trade $X worth, scaled by signal strength
#[derive(Debug, Clone, PartialEq)]
pub enum FixedSizer {
    /// Fixed number of shares per trade
    Quantity { quantity: u64 },

    /// Fixed dollar amount per trade
    Notional { amount: f64 },
}

impl FixedSizer {
    pub fn quantity(quantity: u64) -> Self {
        Self::Quantity { quantity }
    }

    pub fn notional(amount: f64) -> Self {
        Self::Notional { amount }
    }
}

impl Sizer for FixedSizer {
    fn size(&self, signal: &SignalEvent, price: f64, _cash: f64) -> u64 {
        match self {
            Self::Quantity { quantity } => *quantity,
            Self::Notional { amount } => {
                if !(price.is_finite() && price > 0.0) || *amount <= 0.0 {
                    return 0;
                }
                whole_shares(amount * signal.strength / price)
            }
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Quantity { .. } => "FixedQuantity",
            Self::Notional { .. } => "FixedNotional",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SignalDirection, MAX_SHARES};
    use chrono::NaiveDate;

    fn signal(strength: f64) -> SignalEvent {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SignalEvent::new("SPY", SignalDirection::Long, ts).with_strength(strength)
    }

    #[test]
    fn test_fixed_quantity_ignores_price_and_cash() {
        let sizer = FixedSizer::quantity(50);
        assert_eq!(sizer.size(&signal(1.0), 15.0, 0.0), 50);
        assert_eq!(sizer.size(&signal(0.1), 1_000.0, 1.0), 50);
    }

    #[test]
    fn test_fixed_notional_floors_to_whole_shares() {
        let sizer = FixedSizer::notional(1_000.0);
        assert_eq!(sizer.size(&signal(1.0), 30.0, 0.0), 33);
    }

    #[test]
    fn test_fixed_notional_scales_with_strength() {
        let sizer = FixedSizer::notional(10_000.0);
        assert_eq!(sizer.size(&signal(0.5), 100.0, 0.0), 50);
    }

    #[test]
    fn test_fixed_notional_bad_price_is_zero() {
        let sizer = FixedSizer::notional(10_000.0);
        assert_eq!(sizer.size(&signal(1.0), 0.0, 0.0), 0);
        assert_eq!(sizer.size(&signal(1.0), f64::NAN, 0.0), 0);
    }

    #[test]
    fn test_fixed_notional_caps_at_max_shares() {
        let sizer = FixedSizer::notional(1e30);
        assert_eq!(sizer.size(&signal(1.0), 1.0, 0.0), MAX_SHARES);
        assert_eq!(sizer.size(&signal(1.0), 1e-300, 0.0), MAX_SHARES);
    }

    #[test]
    fn test_fixed_notional_nan_strength_is_zero() {
        let sizer = FixedSizer::notional(10_000.0);
        assert_eq!(sizer.size(&signal(f64::NAN), 100.0, 0.0), 0);

        let mut raw = signal(1.0);
        raw.strength = f64::NAN;
        assert_eq!(sizer.size(&raw, 100.0, 0.0), 0);
    }
}
