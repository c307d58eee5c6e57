//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Weighted-average associativity: many fills equal one combined fill
//! 2. Liquidity rule: buys need cash, sells always pass
//! 3. Snapshot count: one snapshot per bar
//! 4. Blotter: at most one terminal transition per order
//! 5. Sizers: output always fits a signed share delta

use chrono::{NaiveDate, NaiveDateTime};
use eventlab_core::domain::{
    apply_long_fill, apply_short_fill, OrderSide, OrderType, OwnedAsset, PositionAccount,
    PositionSide, SignalDirection, MAX_SHARES,
};
use eventlab_core::engine::{Backtest, Blotter, Portfolio};
use eventlab_core::event::{FillEvent, SignalEvent};
use eventlab_core::execution::SimpleExecution;
use eventlab_core::feed::{SyntheticBarFeed, SyntheticConfig};
use eventlab_core::sizers::{FixedFraction, FixedSizer, Sizer};
use eventlab_core::strategy::MovingAverageCrossover;
use proptest::prelude::*;

fn ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_fills() -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::vec((1u64..500, arb_price()), 1..20)
}

fn arb_side() -> impl Strategy<Value = PositionSide> {
    prop_oneof![Just(PositionSide::Long), Just(PositionSide::Short)]
}

fn rel_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ── 1. Weighted-average associativity ────────────────────────────────

proptest! {
    /// Applying fills one at a time gives the same average as one fill of
    /// the total quantity at the volume-weighted price.
    #[test]
    fn average_price_is_associative(side in arb_side(), fills in arb_fills()) {
        let (first_qty, first_px) = fills[0];
        let mut asset = OwnedAsset::new("X", first_qty, side, first_px, ts()).unwrap();
        for &(qty, px) in &fills[1..] {
            asset.make_trade(qty as i64, px).unwrap();
        }

        let total_qty: u64 = fills.iter().map(|(q, _)| q).sum();
        let notional: f64 = fills.iter().map(|&(q, p)| q as f64 * p).sum();
        let combined = OwnedAsset::new("X", total_qty, side, notional / total_qty as f64, ts()).unwrap();

        prop_assert_eq!(asset.shares_owned(), combined.shares_owned());
        prop_assert!(rel_close(asset.average_share_price_paid(), combined.average_share_price_paid()));
        prop_assert!(rel_close(asset.total_position_cost(), combined.total_position_cost()));
    }

    /// Long and short accounts mirror each other: same shares and average,
    /// opposite cost, opposite realized P&L.
    #[test]
    fn long_and_short_mirror(buy in 1u64..500, sell in 1u64..500, p1 in arb_price(), p2 in arb_price()) {
        let sell = sell.min(buy);
        let long = apply_long_fill(apply_long_fill(PositionAccount::default(), buy as i64, p1), -(sell as i64), p2);
        let short = apply_short_fill(apply_short_fill(PositionAccount::default(), buy as i64, p1), -(sell as i64), p2);

        prop_assert_eq!(long.shares_owned, short.shares_owned);
        prop_assert!(rel_close(long.average_share_price_paid, short.average_share_price_paid));
        prop_assert!(rel_close(long.total_position_cost, -short.total_position_cost));
        prop_assert!(rel_close(long.realized_pnl, -short.realized_pnl));
        prop_assert!(rel_close(long.total_position_value, -short.total_position_value));
    }

    /// Unrealized P&L is value plus cost for both sides after any mark.
    #[test]
    fn unrealized_is_value_plus_cost(side in arb_side(), qty in 1u64..1000, entry in arb_price(), mark in arb_price()) {
        let mut asset = OwnedAsset::new("X", qty, side, entry, ts()).unwrap();
        asset.update_total_position_value(mark, ts());
        let expected = match side {
            PositionSide::Long => (mark - entry) * qty as f64,
            PositionSide::Short => (entry - mark) * qty as f64,
        };
        prop_assert!(rel_close(asset.unrealized_pnl(), expected));
        prop_assert!(rel_close(asset.unrealized_pnl(), asset.total_position_value() + asset.total_position_cost()));
    }
}

// ── 2. Liquidity rule ────────────────────────────────────────────────

proptest! {
    #[test]
    fn liquidity_rule(cash in 1.0..1e6_f64, price in arb_price(), qty in -10_000i64..10_000) {
        let portfolio = Portfolio::new(cash, Box::new(FixedSizer::quantity(1))).unwrap();
        let admitted = portfolio.check_liquidity(price, qty);
        if qty < 0 {
            prop_assert!(admitted);
        } else {
            prop_assert_eq!(admitted, price * qty as f64 <= cash);
        }
    }
}

// ── 3. Snapshot count ────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn one_snapshot_per_bar(bars in 1usize..80, seed in any::<u64>(), shares in 1u64..200) {
        let feed = SyntheticBarFeed::new(SyntheticConfig {
            tickers: vec!["A".into(), "B".into()],
            bars,
            seed,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let portfolio = Portfolio::new(50_000.0, Box::new(FixedSizer::quantity(shares))).unwrap();
        let mut bt = Backtest::new(
            Box::new(feed),
            Box::new(MovingAverageCrossover::new(2, 4, true).unwrap()),
            portfolio,
            Box::new(SimpleExecution::default()),
        );
        let summary = bt.run().unwrap();

        prop_assert_eq!(summary.bars, bars);
        prop_assert_eq!(bt.portfolio().snapshots().len(), bars);
        prop_assert!(bt.queue().is_empty());
        prop_assert!(bt.portfolio().positions().values().all(|a| a.shares_owned() > 0));
    }
}

// ── 4. Blotter terminal transitions ──────────────────────────────────

proptest! {
    /// However many fills arrive for an order, at most one completes it and
    /// the filled quantity never exceeds the order quantity.
    #[test]
    fn at_most_one_terminal_transition(qty in 1u64..1000, attempts in prop::collection::vec(1u64..1000, 1..10)) {
        let mut blotter = Blotter::new();
        let order = blotter.place_order("SPY", qty, OrderSide::Buy, OrderType::Market, ts()).unwrap();

        let mut completions = 0;
        for attempt in attempts.iter().copied().chain(std::iter::once(qty)) {
            let fill = FillEvent {
                order_id: order.order_id,
                ticker: "SPY".into(),
                quantity: attempt,
                side: OrderSide::Buy,
                fill_price: 100.0,
                commission: 0.0,
                timestamp: ts(),
            };
            if let Ok(true) = blotter.on_fill(&fill) {
                completions += 1;
            }
        }

        prop_assert!(completions <= 1);
        let stored = blotter.get(order.order_id).unwrap();
        prop_assert!(stored.filled_quantity <= stored.quantity);
        let was_open = stored.is_open();

        // A late rejection only lands on an order that never completed.
        let late = blotter.on_reject(order.order_id, "late");
        prop_assert_eq!(late.is_ok(), was_open);
        prop_assert_eq!(blotter.audit_trail().len(), 1);
    }
}

// ── 5. Sizer bounds ──────────────────────────────────────────────────

fn arb_strength() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(f64::NAN),
        Just(f64::INFINITY),
        -1.0..2.0_f64,
    ]
}

proptest! {
    /// Whatever the inputs, a sized order can be signed without overflow.
    #[test]
    fn sizer_output_fits_a_signed_delta(
        amount in 1e-3..1e300_f64,
        price in 1e-9..1e6_f64,
        cash in -1e3..1e300_f64,
        fraction in 0.01..=1.0_f64,
        strength in arb_strength(),
    ) {
        let mut signal = SignalEvent::new("X", SignalDirection::Long, ts());
        signal.strength = strength;

        let sizers: [Box<dyn Sizer>; 2] = [
            Box::new(FixedSizer::notional(amount)),
            Box::new(FixedFraction::new(fraction).unwrap()),
        ];
        for sizer in &sizers {
            let shares = sizer.size(&signal, price, cash);
            prop_assert!(shares <= MAX_SHARES, "{} sized {}", sizer.name(), shares);
            prop_assert!(OrderSide::Sell.signed(shares).is_some());
            if strength.is_nan() {
                prop_assert_eq!(shares, 0);
            }
        }
    }
}
