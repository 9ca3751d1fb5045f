//! Backtest file: named strategies plus the alerts to run them against.
//!
//! ```toml
//! candles_dir = "data"
//! timestamp_unit = "seconds"
//!
//! [strategies.scalp]
//! profit_targets = [{ multiple = 2.0, fraction = 1.0 }]
//! stop_loss = { initial_pct = -0.2 }
//!
//! [[alerts]]
//! id = "a-1"
//! token = "PEPE"
//! alert_time = "2024-03-01T12:00:00Z"
//! candles = "pepe.csv"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use alertlab_core::config::{ConfigError, StrategyConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::{Alert, TimestampUnit};
use crate::candles::LoadOptions;

#[derive(Debug, Error)]
pub enum BacktestFileError {
    #[error("cannot read backtest file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid backtest TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("backtest file defines no strategies")]
    NoStrategies,

    #[error("strategy '{name}' is invalid: {source}")]
    InvalidStrategy {
        name: String,
        #[source]
        source: ConfigError,
    },

    #[error("alert '{id}': bad alert_time '{value}': {reason}")]
    AlertTime {
        id: String,
        value: String,
        reason: String,
    },

    #[error("alert '{alert}' references unknown strategy '{strategy}'")]
    UnknownStrategy { alert: String, strategy: String },

    #[error("duplicate alert id '{0}'")]
    DuplicateAlert(String),
}

/// One `[[alerts]]` entry as written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertEntry {
    pub id: String,
    pub token: String,
    /// RFC 3339.
    pub alert_time: String,
    /// Candle CSV, relative to `candles_dir`.
    pub candles: PathBuf,
    /// Strategy names to run. Absent means every strategy.
    #[serde(default)]
    pub strategies: Option<Vec<String>>,
}

impl AlertEntry {
    fn parse_time(&self) -> Result<DateTime<Utc>, BacktestFileError> {
        DateTime::parse_from_rfc3339(&self.alert_time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| BacktestFileError::AlertTime {
                id: self.id.clone(),
                value: self.alert_time.clone(),
                reason: e.to_string(),
            })
    }

    pub fn alert(&self) -> Result<Alert, BacktestFileError> {
        Ok(Alert {
            id: self.id.clone(),
            token: self.token.clone(),
            alert_time: self.parse_time()?,
        })
    }
}

/// A parsed and validated backtest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestFile {
    /// Directory candle paths resolve against, relative to the file itself.
    #[serde(default)]
    pub candles_dir: Option<PathBuf>,
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,
    #[serde(default)]
    pub canonicalize: bool,
    pub strategies: BTreeMap<String, StrategyConfig>,
    #[serde(default)]
    pub alerts: Vec<AlertEntry>,
}

impl BacktestFile {
    pub fn from_path(path: &Path) -> Result<Self, BacktestFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| BacktestFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BacktestFileError> {
        let file: Self = toml::from_str(content)?;
        file.validate()?;
        Ok(file)
    }

    /// Every strategy passes engine validation, every alert time parses,
    /// and alerts only reference defined strategies.
    pub fn validate(&self) -> Result<(), BacktestFileError> {
        if self.strategies.is_empty() {
            return Err(BacktestFileError::NoStrategies);
        }
        for (name, strategy) in &self.strategies {
            strategy
                .validate()
                .map_err(|source| BacktestFileError::InvalidStrategy {
                    name: name.clone(),
                    source,
                })?;
        }

        let mut seen = BTreeSet::new();
        for entry in &self.alerts {
            if !seen.insert(entry.id.as_str()) {
                return Err(BacktestFileError::DuplicateAlert(entry.id.clone()));
            }
            entry.parse_time()?;
            for strategy in entry.strategies.iter().flatten() {
                if !self.strategies.contains_key(strategy) {
                    return Err(BacktestFileError::UnknownStrategy {
                        alert: entry.id.clone(),
                        strategy: strategy.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            canonicalize: self.canonicalize,
        }
    }

    /// Directory candle files resolve against, given the backtest file's own
    /// directory.
    pub fn candles_root(&self, base_dir: &Path) -> PathBuf {
        match &self.candles_dir {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        }
    }

    /// Strategy names an alert runs, in name order.
    pub fn strategies_for<'a>(&'a self, entry: &'a AlertEntry) -> Vec<&'a str> {
        match &entry.strategies {
            Some(names) => {
                let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
                wanted.into_iter().collect()
            }
            None => self.strategies.keys().map(String::as_str).collect(),
        }
    }

    /// Narrow the file to a single strategy.
    pub fn only_strategy(&self, name: &str) -> Option<Self> {
        let (key, strategy) = self.strategies.get_key_value(name)?;
        let mut narrowed = self.clone();
        narrowed.strategies = BTreeMap::from([(key.clone(), strategy.clone())]);
        for entry in &mut narrowed.alerts {
            if let Some(names) = entry.strategies.as_mut() {
                names.retain(|n| n == name);
            }
        }
        Some(narrowed)
    }
}
