//! Alerts and their mapping onto candle indices.

use alertlab_core::domain::Candle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit of the integer timestamps in candle files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    #[default]
    Seconds,
    Milliseconds,
}

impl TimestampUnit {
    pub fn timestamp_of(self, time: DateTime<Utc>) -> i64 {
        match self {
            Self::Seconds => time.timestamp(),
            Self::Milliseconds => time.timestamp_millis(),
        }
    }
}

/// One external alert: a token flagged at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub token: String,
    pub alert_time: DateTime<Utc>,
}

impl Alert {
    /// Alert time in the candle file's timestamp unit.
    pub fn timestamp(&self, unit: TimestampUnit) -> i64 {
        unit.timestamp_of(self.alert_time)
    }
}

/// Index of the first candle whose timestamp is at or after `alert_ts`.
///
/// Assumes candles are in timestamp order; an unsorted file gets the
/// partition point of its sorted prefix. `None` when every candle predates
/// the alert.
pub fn start_index_for(candles: &[Candle], alert_ts: i64) -> Option<usize> {
    let idx = candles.partition_point(|c| c.timestamp < alert_ts);
    (idx < candles.len()).then_some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(ts: &[i64]) -> Vec<Candle> {
        ts.iter()
            .map(|&t| Candle::new(t, 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect()
    }

    #[test]
    fn exact_match_starts_on_that_candle() {
        assert_eq!(start_index_for(&at(&[0, 60, 120]), 60), Some(1));
    }

    #[test]
    fn between_candles_starts_on_next() {
        assert_eq!(start_index_for(&at(&[0, 60, 120]), 61), Some(2));
        assert_eq!(start_index_for(&at(&[0, 60, 120]), -5), Some(0));
    }

    #[test]
    fn after_last_candle_is_none() {
        assert_eq!(start_index_for(&at(&[0, 60, 120]), 121), None);
        assert_eq!(start_index_for(&[], 0), None);
    }

    #[test]
    fn timestamp_units() {
        let alert = Alert {
            id: "a".into(),
            token: "PEPE".into(),
            alert_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        assert_eq!(alert.timestamp(TimestampUnit::Seconds), 1_709_294_400);
        assert_eq!(
            alert.timestamp(TimestampUnit::Milliseconds),
            1_709_294_400_000
        );
    }

    proptest! {
        #[test]
        fn matches_linear_scan(mut ts in prop::collection::vec(-1000i64..1000, 0..50), alert in -1100i64..1100) {
            ts.sort_unstable();
            let candles = at(&ts);
            let expected = ts.iter().position(|&t| t >= alert);
            prop_assert_eq!(start_index_for(&candles, alert), expected);
        }
    }
}
