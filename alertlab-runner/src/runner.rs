//! Batch runner: expands a backtest file into (alert × strategy) jobs and
//! runs them through the engine.
//!
//! Two entry points:
//! - `build_jobs()`: loads each candle file once, resolves alert start
//!   indices, and pairs every alert with its strategies.
//! - `run_batch()`: runs jobs sequentially or on the rayon pool. Results come
//!   back in job order either way, so both modes produce identical reports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alertlab_core::domain::Candle;
use alertlab_core::engine::Simulator;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::alert::{start_index_for, Alert};
use crate::candles::{load_candles, LoadError};
use crate::config::{BacktestFile, BacktestFileError};
use crate::report::{BatchReport, JobResult};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("backtest file error: {0}")]
    File(#[from] BacktestFileError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy '{0}' is not defined in the backtest file")]
    UnknownStrategy(String),
}

/// How to run a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// One simulation to run: an alert, a strategy, and the candle window.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub alert: Alert,
    pub strategy: String,
    pub simulator: Arc<Simulator>,
    pub candles: Arc<[Candle]>,
    /// First candle at or after the alert; `candles.len()` when the alert is
    /// past the data, which the engine reports as a no-trade.
    pub start_index: usize,
}

impl BatchJob {
    pub fn run(&self) -> JobResult {
        let result = self.simulator.run(&self.candles, self.start_index);
        debug!(
            alert = %self.alert.id,
            strategy = %self.strategy,
            multiplier = result.final_pnl_multiplier,
            "job complete"
        );
        JobResult {
            alert_id: self.alert.id.clone(),
            token: self.alert.token.clone(),
            strategy: self.strategy.clone(),
            start_index: self.start_index,
            result,
        }
    }
}

/// Expand `file` into jobs, resolving candle paths against `base_dir` (the
/// backtest file's directory).
///
/// Jobs are ordered by alert (file order), then strategy name.
pub fn build_jobs(file: &BacktestFile, base_dir: &Path) -> Result<Vec<BatchJob>, RunError> {
    let simulators: BTreeMap<&str, Arc<Simulator>> = file
        .strategies
        .iter()
        .map(|(name, config)| {
            Simulator::new(config)
                .map(|sim| (name.as_str(), Arc::new(sim)))
                .map_err(|source| BacktestFileError::InvalidStrategy {
                    name: name.clone(),
                    source,
                })
        })
        .collect::<Result<_, _>>()?;

    let root = file.candles_root(base_dir);
    let opts = file.load_options();
    let mut loaded: BTreeMap<PathBuf, Arc<[Candle]>> = BTreeMap::new();
    let mut jobs = Vec::new();

    for entry in &file.alerts {
        let alert = entry.alert()?;
        let path = root.join(&entry.candles);
        let candles = match loaded.get(&path) {
            Some(candles) => Arc::clone(candles),
            None => {
                let candles: Arc<[Candle]> = load_candles(&path, &opts)?.candles.into();
                loaded.insert(path.clone(), Arc::clone(&candles));
                candles
            }
        };

        let alert_ts = alert.timestamp(file.timestamp_unit);
        let start_index = start_index_for(&candles, alert_ts).unwrap_or_else(|| {
            warn!(alert = %alert.id, alert_ts, path = %path.display(), "alert is after the last candle");
            candles.len()
        });

        for name in file.strategies_for(entry) {
            let simulator = simulators
                .get(name)
                .ok_or_else(|| RunError::UnknownStrategy(name.to_string()))?;
            jobs.push(BatchJob {
                alert: alert.clone(),
                strategy: name.to_string(),
                simulator: Arc::clone(simulator),
                candles: Arc::clone(&candles),
                start_index,
            });
        }
    }

    info!(
        alerts = file.alerts.len(),
        strategies = file.strategies.len(),
        files = loaded.len(),
        jobs = jobs.len(),
        "built batch"
    );
    Ok(jobs)
}

/// Run every job and summarize per strategy.
pub fn run_batch(jobs: &[BatchJob], options: BatchOptions) -> BatchReport {
    let span = info_span!("batch", jobs = jobs.len(), parallel = options.parallel);
    let _guard = span.enter();

    let results: Vec<JobResult> = if options.parallel {
        jobs.par_iter().map(BatchJob::run).collect()
    } else {
        jobs.iter().map(BatchJob::run).collect()
    };

    let report = BatchReport::new(results);
    info!(
        jobs = report.jobs.len(),
        traded = report.jobs.iter().filter(|j| j.result.traded()).count(),
        "batch complete"
    );
    report
}

/// Load, expand and run a backtest file in one call.
pub fn run_backtest_file(
    path: &Path,
    strategy: Option<&str>,
    options: BatchOptions,
) -> Result<BatchReport, RunError> {
    let mut file = BacktestFile::from_path(path)?;
    if let Some(name) = strategy {
        file = file
            .only_strategy(name)
            .ok_or_else(|| RunError::UnknownStrategy(name.to_string()))?;
    }
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let jobs = build_jobs(&file, base_dir)?;
    Ok(run_batch(&jobs, options))
}
