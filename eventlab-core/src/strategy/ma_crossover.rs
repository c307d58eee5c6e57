//! Moving Average Crossover strategy
//!
//! Classic trend-following logic on close prices:
//! - Golden cross (fast SMA moves above slow SMA): go LONG
//! - Death cross (fast SMA moves below slow SMA): EXIT, then SHORT if allowed
//!
//! The strategy remembers the stance it last asked for per ticker so that a
//! reversal first exits the old side before entering the new one.

use crate::domain::{Bar, SignalDirection};
use crate::event::{EventQueue, MarketEvent, SignalEvent};
use crate::feed::BarFeed;
use crate::strategy::Strategy;
use std::collections::HashMap;
use tracing::debug;

/// Moving Average Crossover strategy
///
/// # Parameters
/// - `fast`: short SMA period (e.g., 10)
/// - `slow`: long SMA period (e.g., 30), strictly greater than `fast`
/// - `allow_short`: open a short on death cross instead of just exiting
#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    fast: usize,
    slow: usize,
    allow_short: bool,
    stance: HashMap<String, SignalDirection>,
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Golden,
    Death,
}

impl MovingAverageCrossover {
    /// Returns `None` unless `0 < fast < slow`.
    pub fn new(fast: usize, slow: usize, allow_short: bool) -> Option<Self> {
        if fast == 0 || slow <= fast {
            return None;
        }
        Some(Self {
            fast,
            slow,
            allow_short,
            stance: HashMap::new(),
            name: format!("MA_Cross({fast},{slow})"),
        })
    }

    pub fn fast(&self) -> usize {
        self.fast
    }

    pub fn slow(&self) -> usize {
        self.slow
    }

    fn sma(bars: &[Bar], period: usize) -> Option<f64> {
        if bars.len() < period {
            return None;
        }
        let recent = &bars[bars.len() - period..];
        Some(recent.iter().map(|b| b.close).sum::<f64>() / period as f64)
    }

    /// Compare the SMAs on the latest bar and the one before it.
    fn detect_cross(&self, bars: &[Bar]) -> Option<Cross> {
        if bars.len() < self.slow + 1 {
            return None;
        }
        let fast_now = Self::sma(bars, self.fast)?;
        let slow_now = Self::sma(bars, self.slow)?;

        let prev = &bars[..bars.len() - 1];
        let fast_prev = Self::sma(prev, self.fast)?;
        let slow_prev = Self::sma(prev, self.slow)?;

        if fast_prev <= slow_prev && fast_now > slow_now {
            Some(Cross::Golden)
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Some(Cross::Death)
        } else {
            None
        }
    }

    /// Signals to emit for a cross, given the stance held so far.
    fn directions(&self, cross: Cross, stance: Option<SignalDirection>) -> Vec<SignalDirection> {
        let mut out = Vec::with_capacity(2);
        match cross {
            Cross::Golden => {
                if stance == Some(SignalDirection::Short) {
                    out.push(SignalDirection::Exit);
                }
                if stance != Some(SignalDirection::Long) {
                    out.push(SignalDirection::Long);
                }
            }
            Cross::Death => {
                if stance == Some(SignalDirection::Long) {
                    out.push(SignalDirection::Exit);
                }
                if self.allow_short && stance != Some(SignalDirection::Short) {
                    out.push(SignalDirection::Short);
                }
            }
        }
        out
    }
}

impl Strategy for MovingAverageCrossover {
    fn generate_signals(&mut self, event: &MarketEvent, feed: &dyn BarFeed, queue: &mut EventQueue) {
        let Some(batch) = feed.current_batch() else {
            return;
        };
        for ticker in batch.bars.keys() {
            let bars = feed.latest_bars(ticker, self.slow + 1);
            let Some(cross) = self.detect_cross(bars) else {
                continue;
            };

            let stance = self.stance.get(ticker).copied();
            let directions = self.directions(cross, stance);
            for &direction in &directions {
                debug!(%ticker, ?cross, %direction, "crossover signal");
                queue.push(SignalEvent::new(ticker.clone(), direction, event.timestamp));
            }
            match directions.last() {
                Some(SignalDirection::Exit) => {
                    self.stance.remove(ticker);
                }
                Some(&direction) => {
                    self.stance.insert(ticker.clone(), direction);
                }
                None => {}
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_lookback(&self) -> usize {
        self.slow + 1
    }
}
