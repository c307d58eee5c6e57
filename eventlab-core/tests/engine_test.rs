//! End-to-end engine scenarios through the public API.

use chrono::{NaiveDate, NaiveDateTime};
use eventlab_core::domain::{Bar, OrderStatus, PositionSide, RunId, SignalDirection};
use eventlab_core::engine::{
    Backtest, DriverState, EngineError, Portfolio, RejectionReason, SignalDecision,
};
use eventlab_core::event::{Event, EventQueue, FillEvent, MarketEvent, OrderEvent, SignalEvent};
use eventlab_core::execution::{CommissionModel, SimpleExecution};
use eventlab_core::feed::{BarFeed, InMemoryBarFeed, SyntheticBarFeed, SyntheticConfig};
use eventlab_core::persistence::{MemorySink, SinkError, PORTFOLIO_SERIES};
use eventlab_core::sizers::FixedSizer;
use eventlab_core::strategy::{BuyAndHold, MovingAverageCrossover, Strategy};

fn ts(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn flat_bar(ticker: &str, day: u32, price: f64) -> Bar {
    Bar::new(ticker, ts(day), price, price, price, price, 1_000).unwrap()
}

fn take_order(queue: &mut EventQueue) -> OrderEvent {
    match queue.pop_nonblocking().unwrap() {
        Event::Order(order) => order,
        other => panic!("expected ORDER, got {other:?}"),
    }
}

fn fill(order: &OrderEvent, price: f64, commission: f64) -> FillEvent {
    FillEvent {
        order_id: order.order_id,
        ticker: order.ticker.clone(),
        quantity: order.quantity,
        side: order.side,
        fill_price: price,
        commission,
        timestamp: order.timestamp,
    }
}

// ── Liquidity scenarios ──────────────────────────────────────────────

#[test]
fn admitted_signal_then_rejected_signal() {
    let mut feed = InMemoryBarFeed::from_bars(vec![flat_bar("X", 2, 15.0)]).unwrap();
    feed.next_batch().unwrap();
    let mut portfolio = Portfolio::new(1_000.0, Box::new(FixedSizer::quantity(50))).unwrap();
    let mut queue = EventQueue::new();

    let signal = SignalEvent::new("X", SignalDirection::Long, ts(2));
    let decision = portfolio.update_signal(&signal, &feed, &mut queue).unwrap();
    assert!(matches!(decision, SignalDecision::Ordered(_)));

    let order = take_order(&mut queue);
    assert_eq!(order.quantity, 50);
    portfolio.update_fill(&fill(&order, 15.0, 1.0)).unwrap();

    assert_eq!(portfolio.cash(), 249.0);
    assert_eq!(portfolio.position("X").unwrap().shares_owned(), 50);

    let decision = portfolio.update_signal(&signal, &feed, &mut queue).unwrap();
    assert_eq!(
        decision,
        SignalDecision::Rejected(RejectionReason::InsufficientLiquidity)
    );
    assert!(queue.is_empty());
    assert_eq!(portfolio.liquidity_rejections(), 1);
    assert_eq!(portfolio.blotter().total_count(), 1);
}

#[test]
fn notional_beyond_any_order_size_is_dropped() {
    let feed = InMemoryBarFeed::from_bars(vec![flat_bar("X", 2, 1.0)]).unwrap();
    let portfolio = Portfolio::new(1_000.0, Box::new(FixedSizer::notional(1e30))).unwrap();
    let mut bt = Backtest::new(
        Box::new(feed),
        Box::new(BuyAndHold::new()),
        portfolio,
        Box::new(SimpleExecution::default()),
    );
    let summary = bt.run().unwrap();

    assert_eq!(summary.signals, 1);
    assert_eq!(summary.rejected_signals, 1);
    assert_eq!(summary.orders, 0);
    let p = bt.portfolio();
    assert_eq!(p.cash(), 1_000.0);
    assert!(p.positions().is_empty());
    assert_eq!(
        p.rejected_signals()[0].reason,
        RejectionReason::InsufficientLiquidity
    );
}

// ── Round trip ───────────────────────────────────────────────────────

#[test]
fn long_round_trip_gains_twenty() {
    let mut feed =
        InMemoryBarFeed::from_bars(vec![flat_bar("X", 2, 10.0), flat_bar("X", 3, 12.0)]).unwrap();
    let mut portfolio = Portfolio::new(1_000.0, Box::new(FixedSizer::quantity(10))).unwrap();
    let mut queue = EventQueue::new();

    feed.next_batch().unwrap();
    let open = SignalEvent::new("X", SignalDirection::Long, ts(2));
    portfolio.update_signal(&open, &feed, &mut queue).unwrap();
    let order = take_order(&mut queue);
    portfolio.update_fill(&fill(&order, 10.0, 0.0)).unwrap();

    feed.next_batch().unwrap();
    let exit = SignalEvent::new("X", SignalDirection::Exit, ts(3));
    portfolio.update_signal(&exit, &feed, &mut queue).unwrap();
    let order = take_order(&mut queue);
    assert_eq!(order.quantity, 10);
    portfolio.update_fill(&fill(&order, 12.0, 0.0)).unwrap();

    assert_eq!(portfolio.cash() - 1_000.0, 20.0);
    assert_eq!(portfolio.realized_pnl(), 20.0);
    assert!(!portfolio.has_position("X"));
    assert!(portfolio.positions().is_empty());
}

#[test]
fn fill_after_close_starts_a_fresh_asset() {
    let mut feed = InMemoryBarFeed::from_bars(vec![
        flat_bar("X", 2, 10.0),
        flat_bar("X", 3, 12.0),
        flat_bar("X", 4, 20.0),
    ])
    .unwrap();
    let mut portfolio = Portfolio::new(10_000.0, Box::new(FixedSizer::quantity(10))).unwrap();
    let mut queue = EventQueue::new();

    for (day, direction, price) in [
        (2, SignalDirection::Long, 10.0),
        (3, SignalDirection::Exit, 12.0),
        (4, SignalDirection::Short, 20.0),
    ] {
        feed.next_batch().unwrap();
        let signal = SignalEvent::new("X", direction, ts(day));
        portfolio.update_signal(&signal, &feed, &mut queue).unwrap();
        let order = take_order(&mut queue);
        portfolio.update_fill(&fill(&order, price, 0.0)).unwrap();
    }

    let asset = portfolio.position("X").unwrap();
    assert_eq!(asset.position(), PositionSide::Short);
    assert_eq!(asset.shares_owned(), 10);
    assert_eq!(asset.purchase_time(), ts(4));
    assert_eq!(asset.average_share_price_paid(), 20.0);
    assert_eq!(asset.realized_pnl(), 0.0);
    assert_eq!(asset.total_position_cost(), 200.0);
}

// ── Driver ───────────────────────────────────────────────────────────

fn synthetic(tickers: &[&str], bars: usize) -> SyntheticBarFeed {
    SyntheticBarFeed::new(SyntheticConfig {
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        bars,
        seed: 11,
        ..SyntheticConfig::default()
    })
    .unwrap()
}

#[test]
fn one_snapshot_per_bar() {
    let portfolio = Portfolio::new(100_000.0, Box::new(FixedSizer::quantity(10))).unwrap();
    let mut bt = Backtest::new(
        Box::new(synthetic(&["A", "B"], 40)),
        Box::new(MovingAverageCrossover::new(3, 8, true).unwrap()),
        portfolio,
        Box::new(SimpleExecution::new(CommissionModel::Flat(1.0))),
    );
    let summary = bt.run().unwrap();

    assert_eq!(summary.bars, 40);
    assert_eq!(bt.portfolio().snapshots().len(), 40);
    assert_eq!(bt.state(), DriverState::Terminated);

    let mut times = bt.portfolio().snapshots().iter().map(|s| s.timestamp);
    let first = times.next().unwrap();
    times.try_fold(first, |prev, t| (t > prev).then_some(t)).unwrap();
}

#[test]
fn equity_identity_holds_at_end() {
    let portfolio = Portfolio::new(100_000.0, Box::new(FixedSizer::notional(5_000.0))).unwrap();
    let mut bt = Backtest::new(
        Box::new(synthetic(&["A", "B", "C"], 60)),
        Box::new(MovingAverageCrossover::new(2, 5, true).unwrap()),
        portfolio,
        Box::new(SimpleExecution::new(CommissionModel::PerShare {
            rate: 0.01,
            minimum: 1.0,
        })),
    );
    let summary = bt.run().unwrap();
    let p = bt.portfolio();

    let values: f64 = p.positions().values().map(|a| a.total_position_value()).sum();
    assert!((p.equity() - (p.cash() + values)).abs() < 1e-6);
    let filled = p
        .blotter()
        .audit_trail()
        .iter()
        .filter(|e| e.to_status == OrderStatus::Filled)
        .count();
    assert_eq!(summary.fills, filled);
    assert_eq!(summary.orders, summary.fills + summary.rejected_orders);
    for asset in p.positions().values() {
        assert!(asset.shares_owned() > 0);
    }
}

#[test]
fn last_bar_events_are_drained_before_termination() {
    // B first trades on the final bar; its signal, order and fill must all
    // be processed before the driver terminates.
    let feed = InMemoryBarFeed::from_bars(vec![
        flat_bar("A", 2, 10.0),
        flat_bar("A", 3, 10.0),
        flat_bar("B", 3, 5.0),
    ])
    .unwrap();
    let portfolio = Portfolio::new(1_000.0, Box::new(FixedSizer::quantity(1))).unwrap();
    let mut bt = Backtest::new(
        Box::new(feed),
        Box::new(BuyAndHold::new()),
        portfolio,
        Box::new(SimpleExecution::default()),
    );
    let summary = bt.run().unwrap();

    assert_eq!(summary.signals, 2);
    assert_eq!(summary.fills, 2);
    assert!(bt.queue().is_empty());
    assert_eq!(bt.portfolio().position("B").unwrap().shares_owned(), 1);
}

/// Signals for a ticker whose last bar is stale.
struct StaleTicker;

impl Strategy for StaleTicker {
    fn generate_signals(&mut self, event: &MarketEvent, feed: &dyn BarFeed, queue: &mut EventQueue) {
        let in_batch = feed
            .current_batch()
            .map(|b| b.get("B").is_some())
            .unwrap_or(false);
        if !in_batch && feed.latest_bar("B").is_some() {
            queue.push(SignalEvent::new("B", SignalDirection::Long, event.timestamp));
        }
    }

    fn name(&self) -> &str {
        "stale"
    }
}

#[test]
fn execution_rejection_is_recorded_not_fatal() {
    let feed = InMemoryBarFeed::from_bars(vec![
        flat_bar("A", 2, 10.0),
        flat_bar("B", 2, 5.0),
        flat_bar("A", 3, 10.0),
        flat_bar("A", 4, 10.0),
    ])
    .unwrap();
    let portfolio = Portfolio::new(1_000.0, Box::new(FixedSizer::quantity(1))).unwrap();
    let mut bt = Backtest::new(
        Box::new(feed),
        Box::new(StaleTicker),
        portfolio,
        Box::new(SimpleExecution::default()),
    );
    let summary = bt.run().unwrap();

    assert_eq!(summary.bars, 3);
    assert_eq!(summary.orders, 2);
    assert_eq!(summary.rejected_orders, 2);
    assert_eq!(summary.fills, 0);
    let blotter = bt.portfolio().blotter();
    assert_eq!(blotter.open_count(), 0);
    assert!(blotter
        .audit_trail()
        .iter()
        .all(|e| matches!(e.to_status, OrderStatus::Rejected { .. })));
    assert_eq!(bt.portfolio().cash(), 1_000.0);
}

#[test]
fn sink_gets_equity_curve_and_ticker_series() {
    let mut sink = MemorySink::new();
    {
        let portfolio = Portfolio::new(10_000.0, Box::new(FixedSizer::quantity(5))).unwrap();
        let mut bt = Backtest::new(
            Box::new(synthetic(&["A", "B"], 10)),
            Box::new(BuyAndHold::new()),
            portfolio,
            Box::new(SimpleExecution::default()),
        )
        .with_sink(Box::new(&mut sink), RunId::new("abc123"));
        bt.run().unwrap();
    }

    assert!(sink.is_closed());
    assert_eq!(sink.series_names(), vec!["A", "B", PORTFOLIO_SERIES]);
    let equity = sink.series(PORTFOLIO_SERIES).unwrap();
    assert_eq!(equity.len(), 10);
    assert_eq!(equity[0].values["total_equity"], 10_000.0);
    assert_eq!(sink.series("A").unwrap().len(), 9);
}

#[test]
fn ticker_named_like_equity_series_is_refused() {
    let mut sink = MemorySink::new();
    let err = {
        let feed = InMemoryBarFeed::from_bars(vec![
            flat_bar(PORTFOLIO_SERIES, 2, 10.0),
            flat_bar(PORTFOLIO_SERIES, 3, 11.0),
        ])
        .unwrap();
        let portfolio = Portfolio::new(1_000.0, Box::new(FixedSizer::quantity(1))).unwrap();
        let mut bt = Backtest::new(
            Box::new(feed),
            Box::new(BuyAndHold::new()),
            portfolio,
            Box::new(SimpleExecution::default()),
        )
        .with_sink(Box::new(&mut sink), RunId::new("clash"));
        let err = bt.run().unwrap_err();
        assert_eq!(bt.state(), DriverState::Terminated);
        assert_eq!(bt.summary().bars, 0);
        err
    };

    assert!(matches!(
        err,
        EngineError::Sink(SinkError::ReservedSeries(ref t)) if t == PORTFOLIO_SERIES
    ));
    assert!(sink.run_id().is_none());
    assert!(sink.series(PORTFOLIO_SERIES).is_none());
}
