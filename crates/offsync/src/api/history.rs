//! Read-side union of the local queue and the remote table
//!
//! Entries are not deduplicated: a record drained but not yet removed from
//! the queue can appear both locally and in the cloud for a moment.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::PendingQueue;
use crate::sync::{RemoteStore, SyncFlight};
use offsync_api::{PendingRecord, RecordPayload, RemoteRecord, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Local(PendingRecord),
    Cloud(RemoteRecord),
}

impl HistoryEntry {
    /// Stable display key: `local:{client_id}` or `cloud:{id}`.
    pub fn key(&self) -> String {
        match self {
            HistoryEntry::Local(r) => format!("local:{}", r.client_id),
            HistoryEntry::Cloud(r) => format!("cloud:{}", r.id),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Local(r) => r.created_at,
            HistoryEntry::Cloud(r) => r.created_at,
        }
    }

    pub fn payload(&self) -> &RecordPayload {
        match self {
            HistoryEntry::Local(r) => &r.payload,
            HistoryEntry::Cloud(r) => &r.payload,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, HistoryEntry::Local(_))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistorySnapshot {
    /// Local entries first (newest first), then cloud entries (newest first).
    pub entries: Vec<HistoryEntry>,
    pub local_count: usize,
    pub cloud_count: usize,
}

/// Result of [`crate::api::ReconciliationEngine::refresh_history`].
pub struct HistoryRefresh {
    pub snapshot: HistorySnapshot,
    /// Sync requested because local entries were pending. Awaiting it is up to
    /// the caller.
    pub sync: Option<SyncFlight>,
}

pub struct HistoryView;

impl HistoryView {
    /// Without an identity only the local queue is read; with one, both stores
    /// are read concurrently.
    pub async fn load(
        queue: &PendingQueue,
        remote: &dyn RemoteStore,
        user_id: Option<&str>,
    ) -> Result<HistorySnapshot> {
        let (local, cloud) = match user_id {
            Some(user_id) => tokio::try_join!(queue.list(), remote.select(user_id))?,
            None => (queue.list().await?, Vec::new()),
        };

        let local_count = local.len();
        let cloud_count = cloud.len();
        let entries = local
            .into_iter()
            .map(HistoryEntry::Local)
            .chain(cloud.into_iter().map(HistoryEntry::Cloud))
            .collect();

        Ok(HistorySnapshot {
            entries,
            local_count,
            cloud_count,
        })
    }
}
