//! Buy and hold: one LONG signal per ticker, on the first bar it appears.

use crate::domain::SignalDirection;
use crate::event::{EventQueue, MarketEvent, SignalEvent};
use crate::feed::BarFeed;
use crate::strategy::Strategy;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct BuyAndHold {
    bought: HashSet<String>,
}

impl BuyAndHold {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for BuyAndHold {
    fn generate_signals(&mut self, event: &MarketEvent, feed: &dyn BarFeed, queue: &mut EventQueue) {
        let Some(batch) = feed.current_batch() else {
            return;
        };
        for ticker in batch.bars.keys() {
            if self.bought.insert(ticker.clone()) {
                queue.push(SignalEvent::new(
                    ticker.clone(),
                    SignalDirection::Long,
                    event.timestamp,
                ));
            }
        }
    }

    fn name(&self) -> &str {
        "BuyAndHold"
    }
}
