//! Strategies turn market events into trading signals.
//!
//! A strategy reads bars from the feed and pushes SIGNAL events onto the
//! queue. It never sees portfolio state: signals say what the strategy wants,
//! the portfolio decides what it can afford.

pub mod buy_and_hold;
pub mod ma_crossover;

pub use buy_and_hold::BuyAndHold;
pub use ma_crossover::MovingAverageCrossover;

use crate::event::{EventQueue, MarketEvent};
use crate::feed::BarFeed;

/// Signal generator driven by MARKET events.
pub trait Strategy: Send {
    /// React to a new bar batch, pushing zero or more SIGNAL events.
    fn generate_signals(&mut self, event: &MarketEvent, feed: &dyn BarFeed, queue: &mut EventQueue);

    /// Strategy name for logging.
    fn name(&self) -> &str;

    /// Bars of history needed before the first signal can fire.
    fn max_lookback(&self) -> usize {
        1
    }
}
