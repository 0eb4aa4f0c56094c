//! In-process remote table
//!
//! Behaves like a row store with a unique `(user_id, client_id)` index:
//! - upsert overwrites the payload of an existing key and keeps its `id` and
//!   `created_at` (first write wins for the timestamp)
//! - select orders by `created_at` descending
//!
//! It also exposes observation hooks (call counters, concurrency high-water
//! mark, injected failures, a pause gate) so sync behaviour can be asserted
//! without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::sync::RemoteStore;
use offsync_api::{PendingRecord, RemoteRecord, Result, SyncError};

#[derive(Debug, Clone)]
struct StoredRow {
    record: RemoteRecord,
    seq: u64,
}

pub struct InMemoryRemoteStore {
    rows: RwLock<Vec<StoredRow>>,
    next_seq: AtomicU64,
    upsert_calls: AtomicUsize,
    active_upserts: AtomicUsize,
    max_active_upserts: AtomicUsize,
    injected_failures: Mutex<VecDeque<SyncError>>,
    paused: watch::Sender<bool>,
    started: watch::Sender<usize>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            upsert_calls: AtomicUsize::new(0),
            active_upserts: AtomicUsize::new(0),
            max_active_upserts: AtomicUsize::new(0),
            injected_failures: Mutex::new(VecDeque::new()),
            paused: watch::Sender::new(false),
            started: watch::Sender::new(0),
        }
    }

    /// Number of `upsert` calls received so far, including failed ones.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `upsert` calls that were in progress at once.
    pub fn max_concurrent_upserts(&self) -> usize {
        self.max_active_upserts.load(Ordering::SeqCst)
    }

    /// Make the next `upsert` fail with `error` without touching the table.
    pub fn fail_next_upsert(&self, error: SyncError) {
        self.injected_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Hold every `upsert` after it is counted until [`Self::resume_upserts`].
    pub fn pause_upserts(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_upserts(&self) {
        self.paused.send_replace(false);
    }

    /// Wait until at least `count` upserts have started.
    pub async fn wait_for_upserts(&self, count: usize) {
        let mut rx = self.started.subscribe();
        let _ = rx.wait_for(|started| *started >= count).await;
    }

    /// Snapshot of the whole table, unordered.
    pub fn rows(&self) -> Vec<RemoteRecord> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|row| row.record.clone())
            .collect()
    }

    fn apply_upsert(&self, rows: &[PendingRecord], user_id: &str) {
        let mut table = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        for pending in rows {
            let existing = table
                .iter_mut()
                .find(|row| row.record.user_id == user_id && row.record.client_id == pending.client_id);
            match existing {
                Some(row) => {
                    row.record.payload = pending.payload.clone();
                }
                None => {
                    let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                    table.push(StoredRow {
                        record: RemoteRecord {
                            id: Uuid::new_v4().to_string(),
                            user_id: user_id.to_string(),
                            client_id: pending.client_id.clone(),
                            payload: pending.payload.clone(),
                            created_at: Utc::now(),
                        },
                        seq,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn upsert(&self, rows: &[PendingRecord], user_id: &str) -> Result<()> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active_upserts.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_upserts.fetch_max(active, Ordering::SeqCst);
        self.started.send_replace(call);

        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|p| !*p).await;

        let injected = self
            .injected_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let result = match injected {
            Some(err) => Err(err),
            None => {
                self.apply_upsert(rows, user_id);
                Ok(())
            }
        };

        self.active_upserts.fetch_sub(1, Ordering::SeqCst);
        debug!(
            "[InMemoryRemoteStore] upsert #{} of {} rows for {}: ok={}",
            call,
            rows.len(),
            user_id,
            result.is_ok()
        );
        result
    }

    async fn select(&self, user_id: &str) -> Result<Vec<RemoteRecord>> {
        let mut matching: Vec<StoredRow> = self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|row| row.record.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(matching.into_iter().map(|row| row.record).collect())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|row| row.record.id != id);
        Ok(())
    }

    fn store_id(&self) -> &str {
        "memory"
    }
}
