//! Property-based tests for the simulation engine.
//!
//! Invariants:
//! 1. Determinism: same candles + config → identical result
//! 2. Quantity conservation: every leg's exit fills sum to its opened size
//! 3. Stop precedence: a candle touching both stop and target exits at the stop
//! 4. Stop monotonicity: within a leg, logged stop levels never decrease
//! 5. Re-entry never fills across an unseen touch of the exit-time stop
//! 6. Robustness: random gaps and dead candles never produce NaN output

use alertlab_core::config::{
    CompoundingMode, CostConfig, FillModel, ProfitTarget, ReEntryConfig, StopLossConfig,
    StrategyConfig, TimeExitConfig,
};
use alertlab_core::domain::{Candle, EventKind, EventType, ExitReason};
use alertlab_core::engine::{entry_fill_price, exit_fill_price, simulate};
use proptest::prelude::*;

// ── Strategies (proptest) ──

/// Random walk of well-formed candles starting at 1.0.
fn arb_candles(max_len: usize) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec(
        (-0.2..0.2f64, 0.0..0.15f64, 0.0..0.15f64, -0.05..0.05f64),
        2..max_len,
    )
    .prop_map(|steps| {
        let mut price = 1.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (ret, up, down, gap))| {
                let open = price * (1.0 + gap);
                let close = open * (1.0 + ret);
                let high = open.max(close) * (1.0 + up);
                let low = open.min(close) * (1.0 - down);
                price = close;
                Candle::new(i as i64 * 60, open, high, low, close, 100.0)
            })
            .collect()
    })
}

/// Candles with some entries replaced by degenerate data.
fn arb_dirty_candles() -> impl Strategy<Value = Vec<Candle>> {
    (arb_candles(40), prop::collection::vec(0..6u8, 40)).prop_map(|(mut candles, faults)| {
        for (candle, fault) in candles.iter_mut().zip(faults) {
            match fault {
                0 => candle.volume = 0.0,
                1 => candle.close = f64::NAN,
                2 => candle.low = -1.0,
                3 => candle.timestamp = 0,
                _ => {}
            }
        }
        candles
    })
}

fn arb_targets() -> impl Strategy<Value = Vec<ProfitTarget>> {
    prop_oneof![
        Just(vec![]),
        Just(vec![ProfitTarget::new(1.2, 1.0)]),
        Just(vec![ProfitTarget::new(1.1, 0.5), ProfitTarget::new(1.3, 0.5)]),
        Just(vec![
            ProfitTarget::new(1.05, 0.3),
            ProfitTarget::new(1.15, 0.3),
            ProfitTarget::new(1.5, 0.2),
        ]),
    ]
}

fn arb_stop() -> impl Strategy<Value = Option<StopLossConfig>> {
    prop_oneof![
        Just(None),
        (-0.4..-0.02f64).prop_map(|p| Some(StopLossConfig::fixed(p))),
        (-0.4..-0.02f64).prop_map(|p| Some(StopLossConfig::fixed(p).with_break_even())),
        (0.02..0.3f64, 0.0..0.2f64)
            .prop_map(|(t, a)| Some(StopLossConfig::trailing(t, a).with_initial(-0.25))),
        (0.02..0.3f64, 1..6usize).prop_map(|(t, w)| Some(
            StopLossConfig::trailing(t, 0.0).with_rolling_window(w)
        )),
    ]
}

fn arb_re_entry() -> impl Strategy<Value = Option<ReEntryConfig>> {
    prop_oneof![
        Just(None),
        (-0.3..-0.01f64, 0.1..1.0f64, 1..4usize, 0..3usize).prop_map(
            |(trigger_drop_pct, size_fraction, max_re_entries, cooldown_candles)| {
                Some(ReEntryConfig {
                    trigger_drop_pct,
                    size_fraction,
                    max_re_entries,
                    cooldown_candles,
                })
            }
        ),
    ]
}

fn arb_config() -> impl Strategy<Value = StrategyConfig> {
    (
        arb_targets(),
        arb_stop(),
        prop::option::of(1..20usize),
        arb_re_entry(),
        0.0..50.0f64,
        0.0..30.0f64,
        prop_oneof![Just(FillModel::Open), Just(FillModel::Close)],
        prop_oneof![
            Just(CompoundingMode::Additive),
            Just(CompoundingMode::Compounded)
        ],
    )
        .prop_map(
            |(targets, stop, time_exit, re_entry, fee, slippage, fill_model, compounding)| {
                StrategyConfig {
                    profit_targets: targets,
                    stop_loss: stop,
                    time_exit: time_exit.map(|max_candles_in_trade| TimeExitConfig {
                        max_candles_in_trade,
                    }),
                    re_entry,
                    costs: CostConfig::symmetric(fee, slippage),
                    fill_model,
                    compounding,
                    ..StrategyConfig::hold()
                }
            },
        )
}

// ── Properties ──

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn simulation_is_deterministic(candles in arb_candles(60), config in arb_config()) {
        let a = simulate(&candles, 0, &config).unwrap();
        let b = simulate(&candles, 0, &config).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn exit_fills_conserve_leg_size(candles in arb_candles(60), config in arb_config()) {
        let result = simulate(&candles, 0, &config).unwrap();
        for leg in &result.legs {
            let exited: f64 = result
                .events
                .iter()
                .filter(|e| e.leg == leg.leg && e.is_exit_fill())
                .map(|e| e.quantity_fraction)
                .sum();
            prop_assert!(
                (exited - leg.size).abs() < 1e-9,
                "leg {} exited {} of {}", leg.leg, exited, leg.size
            );
        }
        // Every leg ends with exactly one EXIT_FULL
        prop_assert_eq!(result.exit_reasons().len(), result.legs.len());
    }

    #[test]
    fn stop_precedes_target_in_same_candle(
        stop_pct in -0.5..-0.01f64,
        multiple in 1.01..4.0f64,
        overshoot in 0.0..0.5f64,
    ) {
        let config = StrategyConfig::hold()
            .with_targets(vec![ProfitTarget::new(multiple, 1.0)])
            .with_stop_loss(StopLossConfig::fixed(stop_pct));
        let low = (1.0 + stop_pct) * (1.0 - overshoot * 0.5);
        let high = multiple * (1.0 + overshoot);
        let candles = vec![
            Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0),
            Candle::new(60, 1.0, high, low, 1.0, 1.0),
        ];
        let result = simulate(&candles, 0, &config).unwrap();
        prop_assert_eq!(result.exit_reasons(), vec![ExitReason::StopLoss]);
        prop_assert_eq!(result.events_of(EventType::TargetHit).count(), 0);
    }

    #[test]
    fn logged_stops_never_decrease(candles in arb_candles(80), config in arb_config()) {
        let result = simulate(&candles, 0, &config).unwrap();
        for leg in &result.legs {
            let stops: Vec<f64> = result
                .events
                .iter()
                .filter(|e| e.leg == leg.leg)
                .filter_map(|e| match e.kind {
                    EventKind::StopMoved { stop, .. } => Some(stop),
                    _ => None,
                })
                .collect();
            for pair in stops.windows(2) {
                prop_assert!(pair[1] >= pair[0], "stop lowered: {:?}", stops);
            }
        }
    }

    #[test]
    fn re_entry_never_crosses_unseen_stop(candles in arb_candles(80), config in arb_config()) {
        let result = simulate(&candles, 0, &config).unwrap();
        let events = &result.events;
        for (i, armed) in events.iter().enumerate() {
            let EventKind::ReEntryArmed { stop_at_exit: Some(stop), .. } = armed.kind else {
                continue;
            };
            let Some(filled) = events[i..]
                .iter()
                .find(|e| e.event_type() == EventType::ReEntryFilled)
            else {
                continue;
            };
            for candle in &candles[armed.candle_index + 1..filled.candle_index] {
                prop_assert!(
                    candle.low > stop,
                    "re-entered at {} though low {} touched stop {}",
                    filled.candle_index, candle.low, stop
                );
            }
        }
    }

    #[test]
    fn no_op_multiplier_matches_round_trip(candles in arb_candles(40), fee in 0.0..100.0f64) {
        let costs = CostConfig::symmetric(fee, fee / 2.0);
        let config = StrategyConfig::hold().with_costs(costs);
        let result = simulate(&candles, 0, &config).unwrap();
        let last = candles.last().unwrap().close;
        let expected = exit_fill_price(last, &costs) / entry_fill_price(candles[0].open, &costs);
        prop_assert!((result.final_pnl_multiplier - expected).abs() < 1e-9);
    }

    #[test]
    fn dirty_data_stays_finite(candles in arb_dirty_candles(), config in arb_config()) {
        let result = simulate(&candles, 0, &config).unwrap();
        prop_assert!(result.final_pnl_multiplier.is_finite());
        prop_assert!(result.cumulative_pnl.is_finite());
        prop_assert!(result.metrics.max_drawdown <= 0.0);
        for e in &result.events {
            prop_assert!(e.price.is_finite(), "non-finite price in {:?}", e.kind);
            prop_assert!(candles[e.candle_index].is_usable());
        }
        for pair in result.events.windows(2) {
            prop_assert!(pair[0].candle_index <= pair[1].candle_index);
        }
    }

    #[test]
    fn start_index_past_end_never_trades(candles in arb_candles(20), offset in 0..5usize) {
        let start = candles.len() + offset;
        let result = simulate(&candles, start, &StrategyConfig::hold()).unwrap();
        prop_assert!(!result.traded());
        prop_assert_eq!(result.final_pnl_multiplier, 1.0);
    }
}
