//! Position state machine: owns the open leg and advances it one candle at
//! a time.
//!
//! Per-candle order for an open position is fixed:
//!
//! 1. Update the high-watermark and the rolling window of highs.
//! 2. Stop check on the candle low. A fired stop closes everything at the
//!    stop price and ends the candle; targets in the same candle never fill.
//! 3. Profit targets on the candle high, walking the ladder from
//!    `next_target_index`. One candle may fill several targets. The first
//!    fill applies break-even when configured.
//! 4. Targets that close the position emit a zero-quantity
//!    `EXIT_FULL(targets_done)` marker.
//! 5. Trailing stop activation and maintenance. The stop only ever rises.
//! 6. Time exit at the candle's decision price.
//!
//! End-of-data is driven by the caller through `force_exit`.
//!
//! Targets, the break-even stop and trailing activation are measured from
//! the cost-adjusted `entry_price`. The initial stop and the watermark use
//! uncosted market prices. Fills go through the sell-side cost model before
//! PnL is computed.

use super::cost_model::CostModel;
use super::entry::EntryFill;
use super::event_log::EventLog;
use super::result::LegSummary;
use crate::config::{
    FillModel, ProfitTarget, StopLossConfig, StrategyConfig, TimeExitConfig, TrailingMode,
};
use crate::domain::position::FRACTION_EPSILON;
use crate::domain::{Candle, EntryKind, EventKind, ExitReason, Position, SimEvent, StopKind};
use tracing::debug;

/// A leg that has just been fully closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLeg {
    pub summary: LegSummary,
    /// Uncosted price of the closing fill (last target level for targets_done).
    pub exit_reference: f64,
    /// Cost-adjusted price of the last fill that moved quantity.
    pub exit_fill: f64,
    pub exit_index: usize,
    pub exit_timestamp: i64,
    /// Stop level in force when the leg closed.
    pub stop_at_exit: Option<f64>,
}

impl ClosedLeg {
    pub fn reason(&self) -> ExitReason {
        self.summary.exit_reason
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CandleOutcome {
    /// No position is open.
    Flat,
    Holding,
    Closed(ClosedLeg),
}

#[derive(Debug, Clone)]
pub struct PositionMachine {
    targets: Vec<ProfitTarget>,
    stop: Option<StopLossConfig>,
    time_exit: Option<TimeExitConfig>,
    fill_model: FillModel,
    costs: CostModel,
    position: Option<Position>,
}

impl PositionMachine {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            targets: config.profit_targets.clone(),
            stop: config.stop_loss.clone(),
            time_exit: config.time_exit,
            fill_model: config.fill_model,
            costs: CostModel::new(&config.costs),
            position: None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    /// Open a new leg from an entry fill. Replaces nothing: callers open only
    /// when flat.
    pub fn open(&mut self, leg: usize, fill: &EntryFill, size: f64, log: &mut EventLog) {
        debug_assert!(self.position.is_none(), "open called with a live position");
        let entry_price = self.costs.entry_fill_price(fill.price);
        let mut pos = Position::open(
            leg,
            entry_price,
            fill.price,
            fill.candle_index,
            fill.timestamp,
            size,
        );
        if let Some(pct) = self.stop.as_ref().and_then(|s| s.initial_pct) {
            pos.raise_stop(fill.price * (1.0 + pct), StopKind::Initial);
        }

        let kind = match fill.kind {
            EntryKind::ReEntry => EventKind::ReEntryFilled {
                trigger_price: fill.price,
            },
            entry_kind => EventKind::EntryFilled {
                entry_kind,
                reference_price: fill.price,
            },
        };
        let mut event = SimEvent::marker(
            kind,
            leg,
            fill.candle_index,
            fill.timestamp,
            entry_price,
            size,
        )
        .with_fill(size, self.costs.entry_fee(fill.price, size), None);
        if let Some(stop) = pos.stop_price {
            event = event.with_meta("stop", stop);
        }
        log.push(event);

        debug!(
            leg,
            index = fill.candle_index,
            reference = fill.price,
            entry_price,
            stop = ?pos.stop_price,
            "position opened"
        );
        self.position = Some(pos);
    }

    /// Advance the open position through one usable candle after its entry.
    pub fn on_candle(&mut self, index: usize, candle: &Candle, log: &mut EventLog) -> CandleOutcome {
        let Some(pos) = self.position.as_mut() else {
            return CandleOutcome::Flat;
        };
        let ts = candle.timestamp;

        // 1. Watermark and rolling window
        pos.observe_high(candle.high, rolling_window(self.stop.as_ref()));

        // 2. Stop on the low
        if let Some(stop) = pos.stop_price {
            if candle.low <= stop {
                let reason = ExitReason::from_stop(pos.stop_kind);
                return self.close_remaining(index, ts, stop, reason, log);
            }
        }

        // 3. Target ladder on the high
        let mut last_target: Option<(f64, f64)> = None;
        while let Some(target) = self.targets.get(pos.next_target_index).copied() {
            let level = pos.entry_price * target.multiple;
            if candle.high < level || !pos.is_open() {
                break;
            }
            let target_index = pos.next_target_index;
            let mut quantity = (target.fraction * pos.size).min(pos.remaining_fraction);
            if pos.remaining_fraction - quantity < FRACTION_EPSILON {
                quantity = pos.remaining_fraction;
            }

            log.push(SimEvent::marker(
                EventKind::TargetHit {
                    target_index,
                    multiple: target.multiple,
                    target_price: level,
                },
                pos.leg,
                index,
                ts,
                level,
                pos.remaining_fraction,
            ));
            let fill = exit_fill(
                pos,
                &self.costs,
                index,
                ts,
                level,
                quantity,
                EventKind::PartialExit { target_index },
                log,
            );
            pos.next_target_index += 1;
            last_target = Some((level, fill));

            let break_even = self
                .stop
                .as_ref()
                .is_some_and(|s| s.break_even_after_first_target);
            if break_even && !pos.break_even_applied && pos.is_open() {
                pos.break_even_applied = true;
                let entry_price = pos.entry_price;
                move_stop(pos, entry_price, StopKind::BreakEven, index, ts, log);
            }
        }

        // 4. Fully closed by targets
        if !pos.is_open() {
            if let Some((level, fill)) = last_target {
                return self.finish_targets_done(index, ts, level, fill, log);
            }
        }

        // 5. Trailing stop
        if let Some(stop_cfg) = self.stop.as_ref() {
            if let Some(reference_high) = trail_reference(pos, stop_cfg.trailing_mode) {
                let candidate = reference_high * (1.0 - stop_cfg.trailing_pct);
                if !pos.trailing_active {
                    let gain_at_high = candle.high / pos.entry_price - 1.0;
                    if gain_at_high >= stop_cfg.activation_pct {
                        pos.trailing_active = true;
                        log.push(SimEvent::marker(
                            EventKind::TrailingActivated {
                                watermark: reference_high,
                                stop: candidate,
                            },
                            pos.leg,
                            index,
                            ts,
                            candidate,
                            pos.remaining_fraction,
                        ));
                        debug!(leg = pos.leg, index, reference_high, candidate, "trailing activated");
                        move_stop(pos, candidate, StopKind::Trailing, index, ts, log);
                    }
                } else {
                    move_stop(pos, candidate, StopKind::Trailing, index, ts, log);
                }
            }
        }

        // 6. Time exit
        if let Some(time_exit) = self.time_exit {
            if pos.age(index) >= time_exit.max_candles_in_trade {
                let price = candle.decision_price(self.fill_model);
                return self.close_remaining(index, ts, price, ExitReason::TimeExit, log);
            }
        }

        CandleOutcome::Holding
    }

    /// Close whatever remains at `candle`'s close with reason `end_of_data`.
    pub fn force_exit(
        &mut self,
        index: usize,
        candle: &Candle,
        log: &mut EventLog,
    ) -> Option<ClosedLeg> {
        match self.close_remaining(index, candle.timestamp, candle.close, ExitReason::EndOfData, log)
        {
            CandleOutcome::Closed(leg) => Some(leg),
            _ => None,
        }
    }

    fn close_remaining(
        &mut self,
        index: usize,
        ts: i64,
        trigger_price: f64,
        reason: ExitReason,
        log: &mut EventLog,
    ) -> CandleOutcome {
        let Some(mut pos) = self.position.take() else {
            return CandleOutcome::Flat;
        };
        let stop_at_exit = pos.stop_price;
        let quantity = pos.remaining_fraction;
        let fill = exit_fill(
            &mut pos,
            &self.costs,
            index,
            ts,
            trigger_price,
            quantity,
            EventKind::ExitFull { reason },
            log,
        );
        CandleOutcome::Closed(closed_leg(pos, index, ts, trigger_price, fill, reason, stop_at_exit))
    }

    fn finish_targets_done(
        &mut self,
        index: usize,
        ts: i64,
        level: f64,
        fill: f64,
        log: &mut EventLog,
    ) -> CandleOutcome {
        let Some(pos) = self.position.take() else {
            return CandleOutcome::Flat;
        };
        log.push(SimEvent::marker(
            EventKind::ExitFull {
                reason: ExitReason::TargetsDone,
            },
            pos.leg,
            index,
            ts,
            fill,
            0.0,
        ));
        let stop_at_exit = pos.stop_price;
        CandleOutcome::Closed(closed_leg(
            pos,
            index,
            ts,
            level,
            fill,
            ExitReason::TargetsDone,
            stop_at_exit,
        ))
    }
}

fn rolling_window(stop: Option<&StopLossConfig>) -> usize {
    match stop {
        Some(s) if s.trailing_mode == TrailingMode::RollingHigh => s.rolling_window,
        _ => 0,
    }
}

fn trail_reference(pos: &Position, mode: TrailingMode) -> Option<f64> {
    match mode {
        TrailingMode::Off => None,
        TrailingMode::Watermark => Some(pos.high_watermark),
        TrailingMode::RollingHigh => Some(pos.rolling_high()),
    }
}

/// Raise the stop and log the move; no-op when the candidate would loosen it.
fn move_stop(
    pos: &mut Position,
    candidate: f64,
    kind: StopKind,
    index: usize,
    ts: i64,
    log: &mut EventLog,
) {
    if let Some(previous) = pos.raise_stop(candidate, kind) {
        log.push(SimEvent::marker(
            EventKind::StopMoved {
                previous,
                stop: candidate,
                cause: kind,
            },
            pos.leg,
            index,
            ts,
            candidate,
            pos.remaining_fraction,
        ));
    }
}

/// Sell `quantity` at `trigger_price` through the cost model and log it.
/// Returns the cost-adjusted fill price.
#[allow(clippy::too_many_arguments)]
fn exit_fill(
    pos: &mut Position,
    costs: &CostModel,
    index: usize,
    ts: i64,
    trigger_price: f64,
    quantity: f64,
    kind: EventKind,
    log: &mut EventLog,
) -> f64 {
    let fill = costs.exit_fill_price(trigger_price);
    let pnl = pos.pnl_for(quantity, fill);
    pos.reduce(quantity);
    pos.realized_pnl += pnl;
    log.push(
        SimEvent::marker(kind, pos.leg, index, ts, fill, pos.remaining_fraction)
            .with_fill(quantity, costs.exit_fee(trigger_price, quantity), Some(pnl))
            .with_meta("trigger", trigger_price),
    );
    fill
}

fn closed_leg(
    pos: Position,
    index: usize,
    ts: i64,
    exit_reference: f64,
    exit_fill: f64,
    reason: ExitReason,
    stop_at_exit: Option<f64>,
) -> ClosedLeg {
    debug!(
        leg = pos.leg,
        index,
        %reason,
        pnl = pos.realized_pnl,
        "leg closed"
    );
    ClosedLeg {
        summary: LegSummary {
            leg: pos.leg,
            entry_index: pos.entry_index,
            exit_index: index,
            entry_price: pos.entry_price,
            size: pos.size,
            pnl: pos.realized_pnl,
            exit_reason: reason,
        },
        exit_reference,
        exit_fill,
        exit_index: index,
        exit_timestamp: ts,
        stop_at_exit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostConfig;
    use crate::domain::EventType;

    fn candle(index: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(index as i64 * 60, open, high, low, close, 1_000.0)
    }

    fn entry_at(price: f64) -> EntryFill {
        EntryFill {
            price,
            candle_index: 0,
            timestamp: 0,
            kind: EntryKind::Immediate,
        }
    }

    fn opened(config: &StrategyConfig) -> (PositionMachine, EventLog) {
        let mut machine = PositionMachine::new(config);
        let mut log = EventLog::new();
        machine.open(0, &entry_at(1.0), 1.0, &mut log);
        (machine, log)
    }

    #[test]
    fn open_places_initial_stop_from_reference() {
        let config = StrategyConfig::hold()
            .with_stop_loss(StopLossConfig::fixed(-0.2))
            .with_costs(CostConfig::symmetric(50.0, 0.0));
        let (machine, log) = opened(&config);
        let pos = machine.position().unwrap();
        // Stop derives from the uncosted 1.0, not the 1.005 fill
        assert!((pos.stop_price.unwrap() - 0.8).abs() < 1e-12);
        assert!((pos.entry_price - 1.005).abs() < 1e-12);
        assert_eq!(log.events()[0].event_type(), EventType::EntryFilled);
        assert_eq!(log.events()[0].metadata["stop"], "0.8");
    }

    #[test]
    fn target_level_uses_cost_adjusted_entry() {
        let config = StrategyConfig::hold()
            .with_targets(vec![ProfitTarget::new(2.0, 1.0)])
            .with_costs(CostConfig {
                entry_fee_bps: 100.0,
                ..CostConfig::default()
            });
        let (mut machine, mut log) = opened(&config);
        assert!((machine.position().unwrap().entry_price - 1.01).abs() < 1e-12);

        // 2.0 * 1.0 would have filled here; the level is 2.0 * 1.01
        machine.on_candle(1, &candle(1, 1.5, 2.01, 1.5, 2.0), &mut log);
        assert_eq!(log.count(EventType::TargetHit), 0);

        let outcome = machine.on_candle(2, &candle(2, 2.0, 2.03, 2.0, 2.02), &mut log);
        let CandleOutcome::Closed(leg) = outcome else {
            panic!("expected targets_done, got {outcome:?}");
        };
        assert_eq!(leg.reason(), ExitReason::TargetsDone);
        assert!((leg.exit_reference - 2.02).abs() < 1e-12);
    }

    #[test]
    fn break_even_stop_at_cost_adjusted_entry() {
        let config = StrategyConfig::hold()
            .with_targets(vec![ProfitTarget::new(1.5, 0.5), ProfitTarget::new(3.0, 0.5)])
            .with_stop_loss(StopLossConfig::fixed(-0.2).with_break_even())
            .with_costs(CostConfig {
                entry_fee_bps: 100.0,
                ..CostConfig::default()
            });
        let (mut machine, mut log) = opened(&config);
        machine.on_candle(1, &candle(1, 1.0, 1.6, 1.0, 1.55), &mut log);
        let pos = machine.position().unwrap();
        assert_eq!(pos.stop_kind, StopKind::BreakEven);
        assert!((pos.stop_price.unwrap() - 1.01).abs() < 1e-12);

        // Above the uncosted 1.0 but below the paid 1.01
        let outcome = machine.on_candle(2, &candle(2, 1.2, 1.2, 1.005, 1.1), &mut log);
        let CandleOutcome::Closed(leg) = outcome else {
            panic!("expected break-even exit, got {outcome:?}");
        };
        assert_eq!(leg.reason(), ExitReason::BreakEvenStop);
        assert!((leg.exit_reference - 1.01).abs() < 1e-12);
    }

    #[test]
    fn stop_wins_over_target_in_same_candle() {
        let config = StrategyConfig::hold()
            .with_targets(vec![ProfitTarget::new(2.0, 1.0)])
            .with_stop_loss(StopLossConfig::fixed(-0.2));
        let (mut machine, mut log) = opened(&config);
        let outcome = machine.on_candle(1, &candle(1, 1.0, 3.0, 0.7, 1.0), &mut log);
        let CandleOutcome::Closed(leg) = outcome else {
            panic!("expected close, got {outcome:?}");
        };
        assert_eq!(leg.reason(), ExitReason::StopLoss);
        assert!((leg.exit_reference - 0.8).abs() < 1e-12);
        assert_eq!(log.count(EventType::TargetHit), 0);
    }

    #[test]
    fn one_candle_fills_several_targets() {
        let config = StrategyConfig::hold().with_targets(vec![
            ProfitTarget::new(1.5, 0.5),
            ProfitTarget::new(2.0, 0.25),
            ProfitTarget::new(4.0, 0.25),
        ]);
        let (mut machine, mut log) = opened(&config);
        let outcome = machine.on_candle(1, &candle(1, 1.0, 2.2, 1.0, 2.0), &mut log);
        assert_eq!(outcome, CandleOutcome::Holding);
        assert_eq!(log.count(EventType::PartialExit), 2);
        let pos = machine.position().unwrap();
        assert_eq!(pos.next_target_index, 2);
        assert!((pos.remaining_fraction - 0.25).abs() < 1e-12);
    }

    #[test]
    fn targets_done_marker_has_no_quantity() {
        let config = StrategyConfig::hold().with_targets(vec![
            ProfitTarget::new(1.5, 0.5),
            ProfitTarget::new(2.0, 0.5),
        ]);
        let (mut machine, mut log) = opened(&config);
        let outcome = machine.on_candle(1, &candle(1, 1.0, 2.5, 1.0, 2.0), &mut log);
        assert!(matches!(outcome, CandleOutcome::Closed(ref l) if l.reason() == ExitReason::TargetsDone));
        let last = log.last().unwrap();
        assert_eq!(last.event_type(), EventType::ExitFull);
        assert_eq!(last.quantity_fraction, 0.0);
        assert!(last.realized_pnl.is_none());
        // 0.5 * 0.5 + 0.5 * 1.0
        assert!((log.cumulative_pnl() - 0.75).abs() < 1e-12);
        assert!(!machine.is_open());
    }

    #[test]
    fn break_even_raises_stop_after_first_target() {
        let config = StrategyConfig::hold()
            .with_targets(vec![ProfitTarget::new(1.5, 0.5), ProfitTarget::new(3.0, 0.5)])
            .with_stop_loss(StopLossConfig::fixed(-0.2).with_break_even());
        let (mut machine, mut log) = opened(&config);
        machine.on_candle(1, &candle(1, 1.0, 1.6, 1.0, 1.5), &mut log);
        let pos = machine.position().unwrap();
        assert_eq!(pos.stop_price, Some(1.0));
        assert_eq!(pos.stop_kind, StopKind::BreakEven);

        let outcome = machine.on_candle(2, &candle(2, 1.4, 1.4, 0.95, 1.0), &mut log);
        let CandleOutcome::Closed(leg) = outcome else {
            panic!("expected break-even exit");
        };
        assert_eq!(leg.reason(), ExitReason::BreakEvenStop);
    }

    #[test]
    fn trailing_activates_and_ratchets() {
        let config = StrategyConfig::hold().with_stop_loss(StopLossConfig::trailing(0.1, 0.05));
        let (mut machine, mut log) = opened(&config);

        // +2%: below activation
        machine.on_candle(1, &candle(1, 1.0, 1.02, 1.0, 1.01), &mut log);
        assert!(!machine.position().unwrap().trailing_active);

        machine.on_candle(2, &candle(2, 1.01, 1.2, 1.01, 1.15), &mut log);
        let pos = machine.position().unwrap();
        assert!(pos.trailing_active);
        assert!((pos.stop_price.unwrap() - 1.08).abs() < 1e-12);

        // Lower high: stop holds
        machine.on_candle(3, &candle(3, 1.15, 1.16, 1.10, 1.12), &mut log);
        assert!((machine.position().unwrap().stop_price.unwrap() - 1.08).abs() < 1e-12);

        let outcome = machine.on_candle(4, &candle(4, 1.1, 1.1, 1.0, 1.02), &mut log);
        let CandleOutcome::Closed(leg) = outcome else {
            panic!("expected trailing exit");
        };
        assert_eq!(leg.reason(), ExitReason::TrailingStop);
        assert!((leg.exit_reference - 1.08).abs() < 1e-12);
    }

    #[test]
    fn rolling_high_trails_recent_window_only() {
        let config = StrategyConfig::hold()
            .with_stop_loss(StopLossConfig::trailing(0.1, 0.0).with_rolling_window(2));
        let (mut machine, mut log) = opened(&config);
        machine.on_candle(1, &candle(1, 1.0, 1.5, 1.0, 1.4), &mut log);
        assert!((machine.position().unwrap().stop_price.unwrap() - 1.35).abs() < 1e-12);
        // Window max stays 1.5 for one more candle, then drops; stop never lowers
        machine.on_candle(2, &candle(2, 1.4, 1.45, 1.4, 1.42), &mut log);
        machine.on_candle(3, &candle(3, 1.42, 1.44, 1.4, 1.43), &mut log);
        assert!((machine.position().unwrap().stop_price.unwrap() - 1.35).abs() < 1e-12);
    }

    #[test]
    fn time_exit_at_decision_price() {
        let config = StrategyConfig::hold()
            .with_time_exit(2)
            .with_fill_model(FillModel::Close);
        let (mut machine, mut log) = opened(&config);
        assert_eq!(
            machine.on_candle(1, &candle(1, 1.0, 1.1, 0.9, 1.05), &mut log),
            CandleOutcome::Holding
        );
        let outcome = machine.on_candle(2, &candle(2, 1.05, 1.2, 1.0, 1.1), &mut log);
        let CandleOutcome::Closed(leg) = outcome else {
            panic!("expected time exit");
        };
        assert_eq!(leg.reason(), ExitReason::TimeExit);
        assert!((leg.exit_reference - 1.1).abs() < 1e-12);
    }

    #[test]
    fn force_exit_at_close() {
        let (mut machine, mut log) = opened(&StrategyConfig::hold());
        let leg = machine
            .force_exit(3, &candle(3, 1.0, 1.3, 1.0, 1.25), &mut log)
            .unwrap();
        assert_eq!(leg.reason(), ExitReason::EndOfData);
        assert!((leg.summary.pnl - 0.25).abs() < 1e-12);
        assert!(machine.force_exit(4, &candle(4, 1.0, 1.0, 1.0, 1.0), &mut log).is_none());
    }

    #[test]
    fn flat_machine_ignores_candles() {
        let mut machine = PositionMachine::new(&StrategyConfig::hold());
        let mut log = EventLog::new();
        assert_eq!(
            machine.on_candle(1, &candle(1, 1.0, 1.0, 1.0, 1.0), &mut log),
            CandleOutcome::Flat
        );
        assert!(log.is_empty());
    }
}
