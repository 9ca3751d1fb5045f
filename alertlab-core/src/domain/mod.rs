//! Domain types for AlertLab: candles, positions, events, identifiers.

pub mod candle;
pub mod event;
pub mod ids;
pub mod position;

pub use candle::Candle;
pub use event::{EntryKind, EventKind, EventType, ExitReason, SimEvent};
pub use ids::{DatasetHash, RunId};
pub use position::{Position, StopKind};
