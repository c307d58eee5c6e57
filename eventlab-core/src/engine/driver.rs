//! Backtest driver — the event loop.
//!
//! State machine: `AwaitingBar → DrainingEvents → AwaitingBar → … → Terminated`.
//!
//! Each bar pushes one MARKET event, and the queue is drained completely
//! before the next bar is requested. Everything a bar causes (signals, orders,
//! fills) is settled before time advances.

use crate::domain::RunId;
use crate::engine::portfolio::{Portfolio, PortfolioError, SignalDecision};
use crate::event::{Event, EventQueue, MarketEvent};
use crate::execution::{ExecutionOutcome, ExecutionSimulator};
use crate::feed::{BarFeed, FeedError};
use crate::persistence::{
    equity_series, holding_series, is_reserved_ticker, ResultSink, SinkError, PORTFOLIO_SERIES,
};
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Fatal run errors. End of data and rejections are not errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("portfolio error: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("result sink error: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverState {
    AwaitingBar,
    DrainingEvents,
    Terminated,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::AwaitingBar => "AWAITING_BAR",
            DriverState::DrainingEvents => "DRAINING_EVENTS",
            DriverState::Terminated => "TERMINATED",
        };
        write!(f, "{s}")
    }
}

/// Counts reported when the run terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub bars: usize,
    pub signals: usize,
    pub orders: usize,
    pub fills: usize,
    pub rejected_orders: usize,
    pub rejected_signals: usize,
}

struct SinkSlot<'a> {
    sink: Box<dyn ResultSink + 'a>,
    run_id: RunId,
    opened: bool,
}

/// One backtest run over a feed.
pub struct Backtest<'a> {
    feed: Box<dyn BarFeed + 'a>,
    strategy: Box<dyn Strategy + 'a>,
    portfolio: Portfolio,
    execution: Box<dyn ExecutionSimulator + 'a>,
    queue: EventQueue,
    state: DriverState,
    summary: RunSummary,
    drained_this_bar: usize,
    sink: Option<SinkSlot<'a>>,
}

impl<'a> Backtest<'a> {
    pub fn new(
        feed: Box<dyn BarFeed + 'a>,
        strategy: Box<dyn Strategy + 'a>,
        portfolio: Portfolio,
        execution: Box<dyn ExecutionSimulator + 'a>,
    ) -> Self {
        Self {
            feed,
            strategy,
            portfolio,
            execution,
            queue: EventQueue::new(),
            state: DriverState::AwaitingBar,
            summary: RunSummary::default(),
            drained_this_bar: 0,
            sink: None,
        }
    }

    /// Persist the run's series to `sink` under `run_id`.
    pub fn with_sink(mut self, sink: Box<dyn ResultSink + 'a>, run_id: RunId) -> Self {
        self.sink = Some(SinkSlot {
            sink,
            run_id,
            opened: false,
        });
        self
    }

    /// Perform one state transition.
    ///
    /// A fatal error leaves the driver `Terminated`; the sink is never closed
    /// in that case, so nothing is committed.
    pub fn step(&mut self) -> Result<DriverState, EngineError> {
        if let Err(e) = self.transition() {
            self.state = DriverState::Terminated;
            return Err(e);
        }
        Ok(self.state)
    }

    /// Step until `Terminated` and report the final counts.
    pub fn run(&mut self) -> Result<RunSummary, EngineError> {
        info!(
            feed = self.feed.name(),
            strategy = self.strategy.name(),
            sizer = self.portfolio.sizer_name(),
            execution = self.execution.name(),
            max_lookback = self.strategy.max_lookback(),
            "backtest starting"
        );
        while self.step()? != DriverState::Terminated {}
        Ok(self.summary)
    }

    fn transition(&mut self) -> Result<(), EngineError> {
        match self.state {
            DriverState::AwaitingBar => {
                self.open_sink()?;
                match self.feed.next_batch()? {
                    Some(batch) => {
                        self.summary.bars += 1;
                        debug!(
                            "Iteration #{} at {} ({} tickers)",
                            self.summary.bars,
                            batch.timestamp,
                            batch.len()
                        );
                        self.queue.push(MarketEvent {
                            timestamp: batch.timestamp,
                        });
                        self.drained_this_bar = 0;
                        self.state = DriverState::DrainingEvents;
                    }
                    None => {
                        self.finish()?;
                        self.state = DriverState::Terminated;
                    }
                }
            }
            DriverState::DrainingEvents => match self.queue.pop_nonblocking() {
                Ok(event) => {
                    self.drained_this_bar += 1;
                    self.dispatch(event)?;
                }
                Err(_) => {
                    debug!(events = self.drained_this_bar, "bar drained");
                    self.state = DriverState::AwaitingBar;
                }
            },
            DriverState::Terminated => {}
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<(), EngineError> {
        match event {
            Event::Market(market) => {
                self.strategy
                    .generate_signals(&market, &*self.feed, &mut self.queue);
                self.portfolio.update_timeindex(&market, &*self.feed);
            }
            Event::Signal(signal) => {
                self.summary.signals += 1;
                let decision =
                    self.portfolio
                        .update_signal(&signal, &*self.feed, &mut self.queue)?;
                if let SignalDecision::Rejected(_) = decision {
                    self.summary.rejected_signals += 1;
                }
            }
            Event::Order(order) => {
                self.summary.orders += 1;
                match self.execution.execute(&order, &*self.feed) {
                    ExecutionOutcome::Filled(fill) => self.queue.push(fill),
                    ExecutionOutcome::Rejected { order_id, reason } => {
                        self.summary.rejected_orders += 1;
                        self.portfolio
                            .on_order_rejected(order_id, &reason.to_string())?;
                    }
                }
            }
            Event::Fill(fill) => {
                self.summary.fills += 1;
                self.portfolio.update_fill(&fill)?;
            }
        }
        Ok(())
    }

    /// Open the sink before the first bar. A ticker named like the equity
    /// series would interleave its rows with the curve, so it is refused here.
    fn open_sink(&mut self) -> Result<(), EngineError> {
        if let Some(slot) = self.sink.as_mut() {
            if !slot.opened {
                let tickers = self.feed.tickers();
                if let Some(ticker) = tickers.into_iter().find(|t| is_reserved_ticker(t)) {
                    return Err(SinkError::ReservedSeries(ticker).into());
                }
                slot.sink.open(&slot.run_id)?;
                slot.opened = true;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        if let Some(slot) = self.sink.as_mut() {
            let snapshots = self.portfolio.snapshots();
            slot.sink.append(
                PORTFOLIO_SERIES,
                &equity_series(snapshots, self.portfolio.initial_capital()),
            )?;
            for (ticker, rows) in holding_series(snapshots) {
                slot.sink.append(&ticker, &rows)?;
            }
            slot.sink.close()?;
        }

        let s = &self.summary;
        info!(
            bars = s.bars,
            signals = s.signals,
            orders = s.orders,
            fills = s.fills,
            rejected_orders = s.rejected_orders,
            rejected_signals = s.rejected_signals,
            final_equity = self.portfolio.equity(),
            "backtest terminated"
        );
        Ok(())
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }
}
