//! Re-entry controller: decides whether and when to re-open after a full
//! exit.
//!
//! After a leg closes (anything but end-of-data) and re-entries remain, the
//! controller arms a trigger `exit_price * (1 + trigger_drop_pct)`. A candle
//! whose low reaches the trigger, once the cooldown has elapsed, is a
//! candidate. Before filling, every usable candle strictly between the exit
//! and the candidate is checked against the stop level that was active at
//! exit: if any low reached it, the opportunity is rejected and the run
//! closes.

use super::entry::EntryFill;
use super::event_log::EventLog;
use super::position_machine::ClosedLeg;
use super::quality::UsableMask;
use crate::config::ReEntryConfig;
use crate::domain::{Candle, EntryKind, EventKind, ExitReason, SimEvent};
use tracing::debug;

/// An armed re-entry waiting for its trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReEntryWait {
    pub trigger_price: f64,
    pub exit_index: usize,
    pub stop_at_exit: Option<f64>,
    /// Leg number the re-entry will open.
    pub next_leg: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReEntryDecision {
    /// Not armed, trigger not reached, or still cooling down.
    Wait,
    Enter(EntryFill),
    Reject {
        breach_index: usize,
        breach_low: f64,
        stop_at_exit: f64,
    },
}

#[derive(Debug, Clone)]
pub struct ReEntryController {
    config: Option<ReEntryConfig>,
    used: usize,
    wait: Option<ReEntryWait>,
}

impl ReEntryController {
    pub fn new(config: Option<ReEntryConfig>) -> Self {
        Self {
            config,
            used: 0,
            wait: None,
        }
    }

    pub fn re_entries_used(&self) -> usize {
        self.used
    }

    pub fn is_waiting(&self) -> bool {
        self.wait.is_some()
    }

    pub fn pending(&self) -> Option<&ReEntryWait> {
        self.wait.as_ref()
    }

    /// Size of a re-entry leg as a fraction of the original unit.
    pub fn size_fraction(&self) -> f64 {
        self.config.map_or(0.0, |c| c.size_fraction)
    }

    /// Arm after `closed`. Returns whether a wait began.
    pub fn arm(&mut self, closed: &ClosedLeg, log: &mut EventLog) -> bool {
        let Some(config) = self.config else {
            return false;
        };
        if closed.reason() == ExitReason::EndOfData || self.used >= config.max_re_entries {
            return false;
        }
        let trigger_price = closed.exit_reference * (1.0 + config.trigger_drop_pct);
        if !trigger_price.is_finite() || trigger_price <= 0.0 {
            return false;
        }

        let wait = ReEntryWait {
            trigger_price,
            exit_index: closed.exit_index,
            stop_at_exit: closed.stop_at_exit,
            next_leg: closed.summary.leg + 1,
        };
        log.push(SimEvent::marker(
            EventKind::ReEntryArmed {
                trigger_price,
                stop_at_exit: closed.stop_at_exit,
                re_entries_used: self.used,
            },
            closed.summary.leg,
            closed.exit_index,
            closed.exit_timestamp,
            trigger_price,
            0.0,
        ));
        debug!(
            trigger_price,
            exit_index = closed.exit_index,
            used = self.used,
            "re-entry armed"
        );
        self.wait = Some(wait);
        true
    }

    /// Evaluate usable candle `index` while waiting.
    ///
    /// On `Enter` the counter is incremented; on `Reject` a
    /// `RE_ENTRY_REJECTED` event is logged. Either way the wait ends.
    pub fn on_candle(
        &mut self,
        candles: &[Candle],
        mask: &UsableMask,
        index: usize,
        log: &mut EventLog,
    ) -> ReEntryDecision {
        let (Some(wait), Some(config)) = (self.wait, self.config) else {
            return ReEntryDecision::Wait;
        };
        let candle = &candles[index];
        if candle.low > wait.trigger_price {
            return ReEntryDecision::Wait;
        }
        if index.saturating_sub(wait.exit_index) < config.cooldown_candles {
            return ReEntryDecision::Wait;
        }

        self.wait = None;

        if let Some(stop) = wait.stop_at_exit {
            let breach = mask
                .usable_in(wait.exit_index + 1..index)
                .find(|&j| candles[j].low <= stop);
            if let Some(breach_index) = breach {
                let breach_low = candles[breach_index].low;
                log.push(SimEvent::marker(
                    EventKind::ReEntryRejected {
                        breach_index,
                        breach_low,
                        stop_at_exit: stop,
                    },
                    wait.next_leg,
                    index,
                    candle.timestamp,
                    wait.trigger_price,
                    0.0,
                ));
                debug!(breach_index, breach_low, stop, "re-entry rejected");
                return ReEntryDecision::Reject {
                    breach_index,
                    breach_low,
                    stop_at_exit: stop,
                };
            }
        }

        self.used += 1;
        ReEntryDecision::Enter(EntryFill {
            price: wait.trigger_price,
            candle_index: index,
            timestamp: candle.timestamp,
            kind: EntryKind::ReEntry,
        })
    }

    /// End an unfilled wait at end of data, logging `RE_ENTRY_EXPIRED`.
    pub fn expire(&mut self, index: usize, timestamp: i64, log: &mut EventLog) -> bool {
        let Some(wait) = self.wait.take() else {
            return false;
        };
        log.push(SimEvent::marker(
            EventKind::ReEntryExpired {
                trigger_price: wait.trigger_price,
            },
            wait.next_leg,
            index,
            timestamp,
            wait.trigger_price,
            0.0,
        ));
        true
    }
}
