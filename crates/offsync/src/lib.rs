//! Offline-first reconciliation engine
//!
//! Records are appended to a durable local queue and later drained to a keyed
//! remote table by a single-flight coordinator. See [`api::ReconciliationEngine`]
//! for the caller-facing operations.

pub mod api;
pub mod core;
pub mod storage;
pub mod sync;
pub mod telemetry;

pub use api::{EngineConfig, HistoryEntry, HistorySnapshot, ReconciliationEngine};
pub use crate::core::PendingQueue;
pub use offsync_api::{PendingRecord, RecordPayload, RemoteRecord, SyncError, SyncOutcome};
pub use sync::{InMemoryRemoteStore, RemoteStore, SyncCoordinator, SyncFlight};
