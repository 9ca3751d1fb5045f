//! Candle loading for the runner.
//!
//! Candle files are CSV with the header
//! `timestamp,open,high,low,close,volume`. Rows are handed to the engine as
//! they appear unless canonicalization is requested, in which case they are
//! stable-sorted by timestamp and later duplicates of a timestamp are
//! dropped. The engine tolerates unsorted and degenerate rows on its own, so
//! canonicalization only changes which rows it sees, never whether it runs.

use std::io::Read;
use std::path::{Path, PathBuf};

use alertlab_core::domain::{Candle, DatasetHash};
use alertlab_core::fingerprint;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the candle loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read candles from '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("candle file '{path}' has no rows")]
    Empty { path: PathBuf },
}

/// Options controlling how candles are loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Stable-sort by timestamp and drop duplicate timestamps.
    pub canonicalize: bool,
}

/// What canonicalization changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalizeReport {
    /// Rows were not already in non-decreasing timestamp order.
    pub reordered: bool,
    /// Rows dropped because an earlier row had the same timestamp.
    pub duplicates_removed: usize,
}

impl CanonicalizeReport {
    pub fn changed(&self) -> bool {
        self.reordered || self.duplicates_removed > 0
    }
}

/// Candles from one file, plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCandles {
    pub path: PathBuf,
    pub candles: Vec<Candle>,
    /// BLAKE3 over the candles as handed to the engine.
    pub dataset_hash: DatasetHash,
    /// Present when canonicalization ran.
    pub canonicalize_report: Option<CanonicalizeReport>,
}

/// Load a candle CSV from disk.
pub fn load_candles(path: &Path, opts: &LoadOptions) -> Result<LoadedCandles, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    read_candles(reader, path, opts)
}

/// Load candles from any CSV source. `label` names the source in errors.
pub fn load_candles_from_reader<R: Read>(
    rdr: R,
    label: &Path,
    opts: &LoadOptions,
) -> Result<LoadedCandles, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);
    read_candles(reader, label, opts)
}

fn read_candles<R: Read>(
    mut reader: csv::Reader<R>,
    path: &Path,
    opts: &LoadOptions,
) -> Result<LoadedCandles, LoadError> {
    let mut candles = reader
        .deserialize::<Candle>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    if candles.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    let canonicalize_report = opts.canonicalize.then(|| canonicalize(&mut candles));
    if let Some(report) = canonicalize_report.filter(CanonicalizeReport::changed) {
        warn!(
            path = %path.display(),
            reordered = report.reordered,
            duplicates_removed = report.duplicates_removed,
            "canonicalized candle file"
        );
    }

    let dataset_hash = fingerprint::dataset_hash(&candles);
    debug!(path = %path.display(), rows = candles.len(), %dataset_hash, "loaded candles");
    Ok(LoadedCandles {
        path: path.to_path_buf(),
        candles,
        dataset_hash,
        canonicalize_report,
    })
}

/// Stable sort by timestamp, keeping the first row of each timestamp.
pub fn canonicalize(candles: &mut Vec<Candle>) -> CanonicalizeReport {
    let reordered = candles.windows(2).any(|w| w[1].timestamp < w[0].timestamp);
    if reordered {
        candles.sort_by_key(|c| c.timestamp);
    }
    let before = candles.len();
    candles.dedup_by_key(|c| c.timestamp);
    CanonicalizeReport {
        reordered,
        duplicates_removed: before - candles.len(),
    }
}
