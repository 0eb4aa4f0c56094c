pub mod config;
pub mod engine;
pub mod history;

pub use config::{EngineConfig, DEFAULT_QUEUE_KEY};
pub use engine::ReconciliationEngine;
pub use history::{HistoryEntry, HistoryRefresh, HistorySnapshot, HistoryView};
