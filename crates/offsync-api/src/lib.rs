//! Shared types for the offsync reconciliation engine
//!
//! This crate carries the vocabulary every other offsync crate speaks:
//! - `record`: pending (local) and remote record shapes plus the upsert wire row
//! - `error`: the `SyncError` taxonomy surfaced to engine callers
//!
//! It performs no I/O.

pub mod error;
pub mod record;

pub use error::{Result, SyncError};
pub use record::{ClientId, PendingRecord, RecordPayload, RemoteRecord, SyncOutcome, UpsertRow};
