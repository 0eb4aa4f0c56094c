//! Persistent queue of records that have not been synced yet.
//!
//! The whole queue is stored as one JSON array under a single key of a
//! [`KeyValueStore`]. The store has no transactions, so every operation runs
//! under one async mutex held across its full read-modify-write.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::storage::KeyValueStore;
use offsync_api::{PendingRecord, Result};

pub struct PendingQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    write_lock: Mutex<()>,
}

impl PendingQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Insert `record` at the front (newest first).
    pub async fn append(&self, record: PendingRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        debug!(
            "[PendingQueue] append client_id={} (queue len {})",
            record.client_id,
            items.len()
        );
        items.insert(0, record);
        self.save(&items).await
    }

    /// The full queue, newest first. A value that fails to parse reads as empty.
    pub async fn list(&self) -> Result<Vec<PendingRecord>> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    /// Remove the first entry with this client id; no-op if absent.
    pub async fn remove_by_client_id(&self, client_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        let Some(pos) = items.iter().position(|r| r.client_id == client_id) else {
            debug!("[PendingQueue] remove: client_id={} not queued", client_id);
            return Ok(());
        };
        items.remove(pos);
        self.save(&items).await
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(&self.key).await?;
        debug!("[PendingQueue] cleared");
        Ok(())
    }

    /// Drop the records a sync pass has just upserted.
    ///
    /// Each id removes one entry, oldest first, so entries appended after the
    /// pass read the queue are kept even when they reuse a drained id. When nothing
    /// is left the key is removed, same as [`PendingQueue::clear`].
    pub async fn remove_synced(&self, client_ids: &[String]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut pending_removals: HashMap<&str, usize> = HashMap::new();
        for id in client_ids {
            *pending_removals.entry(id.as_str()).or_default() += 1;
        }
        let items = self.load().await?;
        let before = items.len();

        // Oldest entries sit at the back and are the ones the pass drained.
        let mut remaining: Vec<PendingRecord> = Vec::with_capacity(before);
        for record in items.into_iter().rev() {
            match pending_removals.get_mut(record.client_id.as_str()) {
                Some(count) if *count > 0 => *count -= 1,
                _ => remaining.push(record),
            }
        }
        remaining.reverse();
        let removed = before - remaining.len();

        if remaining.is_empty() {
            self.store.remove(&self.key).await?;
        } else {
            self.save(&remaining).await?;
        }
        debug!(
            "[PendingQueue] removed {} synced records, {} remain",
            removed,
            remaining.len()
        );
        Ok(removed)
    }

    async fn load(&self) -> Result<Vec<PendingRecord>> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<PendingRecord>>(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(
                    "[PendingQueue] discarding unreadable queue under '{}': {}",
                    self.key, e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, items: &[PendingRecord]) -> Result<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(&self.key, raw).await?;
        Ok(())
    }
}
