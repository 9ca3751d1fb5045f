//! Event log: ordered, append-only record of every transition in a run.
//!
//! The log owns `cumulative_pnl`: each pushed event is stamped with the
//! running sum of realized PnL up to and including itself, so replaying the
//! log reproduces the equity curve exactly.

use crate::domain::{EventType, SimEvent};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SimEvent>,
    cumulative_pnl: f64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, stamping its `cumulative_pnl`.
    pub fn push(&mut self, mut event: SimEvent) {
        if let Some(pnl) = event.realized_pnl {
            self.cumulative_pnl += pnl;
        }
        event.cumulative_pnl = self.cumulative_pnl;
        trace!(
            event = %event.event_type(),
            index = event.candle_index,
            price = event.price,
            cumulative_pnl = self.cumulative_pnl,
            "event"
        );
        self.events.push(event);
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SimEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn cumulative_pnl(&self) -> f64 {
        self.cumulative_pnl
    }

    pub fn last(&self) -> Option<&SimEvent> {
        self.events.last()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// PnL of every exit fill, in log order.
    pub fn fill_pnls(&self) -> Vec<f64> {
        fill_pnls(&self.events)
    }

    /// Synthetic equity curve: 1.0, then `1 + cumulative_pnl` after each event.
    pub fn equity_curve(&self) -> Vec<f64> {
        equity_curve(&self.events)
    }
}

pub fn fill_pnls(events: &[SimEvent]) -> Vec<f64> {
    events.iter().filter_map(|e| e.realized_pnl).collect()
}

pub fn equity_curve(events: &[SimEvent]) -> Vec<f64> {
    std::iter::once(1.0)
        .chain(events.iter().map(|e| 1.0 + e.cumulative_pnl))
        .collect()
}
