//! What a strategy wants, independent of what the portfolio holds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Desired market exposure emitted by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalDirection {
    /// Want long exposure (buy).
    Long,
    /// Want short exposure (sell).
    Short,
    /// Want no exposure (close whatever is held).
    Exit,
}

impl SignalDirection {
    pub fn is_directional(&self) -> bool {
        matches!(self, SignalDirection::Long | SignalDirection::Short)
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Long => write!(f, "LONG"),
            SignalDirection::Short => write!(f, "SHORT"),
            SignalDirection::Exit => write!(f, "EXIT"),
        }
    }
}
