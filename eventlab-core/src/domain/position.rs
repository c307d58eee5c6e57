use super::order::OrderSide;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of the market a held position is on.
///
/// Fixed for the life of an `OwnedAsset`; flipping sides closes the asset and
/// opens a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// The side a fresh position takes when opened by a fill on `side`.
    pub fn opened_by(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        }
    }

    /// Signed share delta a fill applies to a position on this side.
    ///
    /// Buys grow longs and shrink shorts; sells do the opposite. `None` when
    /// `quantity` does not fit in `i64`.
    pub fn share_delta(&self, side: OrderSide, quantity: u64) -> Option<i64> {
        let q = i64::try_from(quantity).ok()?;
        Some(match (self, side) {
            (PositionSide::Long, OrderSide::Buy) | (PositionSide::Short, OrderSide::Sell) => q,
            (PositionSide::Long, OrderSide::Sell) | (PositionSide::Short, OrderSide::Buy) => -q,
        })
    }

    /// Order side that reduces a position on this side.
    pub fn closing_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// Unknown position side string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown position side '{0}' (expected LONG or SHORT)")]
pub struct ParsePositionSideError(pub String);

impl FromStr for PositionSide {
    type Err = ParsePositionSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(PositionSide::Long),
            "SHORT" => Ok(PositionSide::Short),
            _ => Err(ParsePositionSideError(s.to_string())),
        }
    }
}
