//! Run fingerprinting: deterministic identification of a simulation.
//!
//! - `config_hash`: the strategy alone (canonical JSON of `StrategyConfig`).
//! - `dataset_hash`: the candle window alone (bit patterns of every field).
//! - `run_id`: config + candles + start index. Identical inputs give the same
//!   ID on every platform, so results can be deduplicated and compared.

use crate::config::StrategyConfig;
use crate::domain::{Candle, DatasetHash, RunId};

/// BLAKE3 of the strategy's canonical JSON.
///
/// Struct fields serialize in declaration order, so the JSON is stable for a
/// given build of the config types.
pub fn config_hash(config: &StrategyConfig) -> String {
    let json = serde_json::to_vec(config).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}

/// BLAKE3 over the raw bit patterns of the candle window. NaN payloads and
/// signed zeros hash distinctly, matching what the engine actually saw.
pub fn dataset_hash(candles: &[Candle]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    feed_candles(&mut hasher, candles);
    DatasetHash(hasher.finalize().to_hex().to_string())
}

pub fn run_id(config: &StrategyConfig, candles: &[Candle], start_index: usize) -> RunId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config_hash(config).as_bytes());
    hasher.update(&(start_index as u64).to_le_bytes());
    feed_candles(&mut hasher, candles);
    RunId(hasher.finalize().to_hex().to_string())
}

fn feed_candles(hasher: &mut blake3::Hasher, candles: &[Candle]) {
    hasher.update(&(candles.len() as u64).to_le_bytes());
    for c in candles {
        hasher.update(&c.timestamp.to_le_bytes());
        for v in [c.open, c.high, c.low, c.close, c.volume] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
}
