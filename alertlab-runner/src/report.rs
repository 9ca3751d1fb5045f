//! Batch results and per-strategy summaries.

use std::collections::BTreeMap;

use alertlab_core::engine::SimResult;
use serde::{Deserialize, Serialize};

/// Outcome of one (alert, strategy) job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub alert_id: String,
    pub token: String,
    pub strategy: String,
    pub start_index: usize,
    pub result: SimResult,
}

/// Aggregate over every job of one strategy.
///
/// Multiplier statistics and the win rate cover traded runs only. No-trade
/// runs still count toward `runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy: String,
    pub runs: usize,
    pub traded: usize,
    pub mean_multiplier: Option<f64>,
    pub median_multiplier: Option<f64>,
    /// Fraction of traded runs that finished above 1.0.
    pub win_rate: Option<f64>,
    /// Legs across all runs.
    pub total_trades: usize,
}

impl StrategySummary {
    pub fn from_results<'a>(
        strategy: &str,
        results: impl IntoIterator<Item = &'a JobResult>,
    ) -> Self {
        let mut runs = 0;
        let mut total_trades = 0;
        let mut multipliers = Vec::new();
        for job in results {
            runs += 1;
            total_trades += job.result.metrics.total_trades;
            if job.result.traded() {
                multipliers.push(job.result.final_pnl_multiplier);
            }
        }

        let traded = multipliers.len();
        let wins = multipliers.iter().filter(|&&m| m > 1.0).count();
        Self {
            strategy: strategy.to_string(),
            runs,
            traded,
            mean_multiplier: mean(&multipliers),
            median_multiplier: median(&mut multipliers),
            win_rate: (traded > 0).then(|| wins as f64 / traded as f64),
            total_trades,
        }
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// In job order.
    pub jobs: Vec<JobResult>,
    /// Sorted by strategy name.
    pub summaries: Vec<StrategySummary>,
}

impl BatchReport {
    pub fn new(jobs: Vec<JobResult>) -> Self {
        let mut by_strategy: BTreeMap<&str, Vec<&JobResult>> = BTreeMap::new();
        for job in &jobs {
            by_strategy.entry(job.strategy.as_str()).or_default().push(job);
        }
        let summaries = by_strategy
            .into_iter()
            .map(|(name, results)| StrategySummary::from_results(name, results))
            .collect();
        Self { jobs, summaries }
    }

    pub fn summary(&self, strategy: &str) -> Option<&StrategySummary> {
        self.summaries.iter().find(|s| s.strategy == strategy)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
