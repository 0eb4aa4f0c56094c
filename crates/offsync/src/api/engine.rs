//! Public surface of the reconciliation engine
//!
//! `ReconciliationEngine` owns the pending queue and the remote store handle
//! and binds one [`SyncCoordinator`] per signed-in identity. All coordinators
//! share one drain lock, so switching identity never lets two drains overlap.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::api::config::EngineConfig;
use crate::api::history::{HistoryEntry, HistoryRefresh, HistorySnapshot, HistoryView};
use crate::core::PendingQueue;
use crate::storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use crate::sync::{RemoteStore, SyncCoordinator, SyncFlight};
use offsync_api::{PendingRecord, Result};

pub struct ReconciliationEngine {
    queue: Arc<PendingQueue>,
    remote: Arc<dyn RemoteStore>,
    drain_lock: Arc<tokio::sync::Mutex<()>>,
    session: Mutex<Option<Arc<SyncCoordinator>>>,
}

impl ReconciliationEngine {
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            queue: Arc::new(PendingQueue::new(store, config.queue_key.clone())),
            remote,
            drain_lock: Arc::new(tokio::sync::Mutex::new(())),
            session: Mutex::new(None),
        }
    }

    /// Build an engine whose queue lives in `config.storage_dir`, or in memory
    /// when no directory is configured.
    pub async fn open(config: &EngineConfig, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.storage_dir {
            Some(dir) => Arc::new(FileKeyValueStore::open(dir).await?),
            None => Arc::new(MemoryKeyValueStore::new()),
        };
        info!(
            "[ReconciliationEngine] opened queue '{}' (remote: {})",
            config.queue_key,
            remote.store_id()
        );
        Ok(Self::new(config, store, remote))
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }

    pub async fn add_pending(&self, record: PendingRecord) -> Result<()> {
        self.queue.append(record).await
    }

    pub async fn remove_pending(&self, client_id: &str) -> Result<()> {
        self.queue.remove_by_client_id(client_id).await
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingRecord>> {
        self.queue.list().await
    }

    /// Drain the queue to the remote store as `user_id`.
    ///
    /// Concurrent requests for the same identity share one flight. Callers that
    /// only sync as a side effect may drop or ignore the returned handle; the
    /// engine itself never discards a failure.
    pub fn request_sync(&self, user_id: &str) -> SyncFlight {
        self.coordinator_for(user_id).request_sync()
    }

    /// The coordinator bound to `user_id`, replacing the session binding if a
    /// different identity was active.
    pub fn coordinator_for(&self, user_id: &str) -> Arc<SyncCoordinator> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = session.as_ref() {
            if current.user_id() == user_id {
                return Arc::clone(current);
            }
            info!(
                "[ReconciliationEngine] identity changed from {} to {}",
                current.user_id(),
                user_id
            );
        }
        let coordinator = Arc::new(SyncCoordinator::new(
            user_id,
            Arc::clone(&self.queue),
            Arc::clone(&self.remote),
            Arc::clone(&self.drain_lock),
        ));
        *session = Some(Arc::clone(&coordinator));
        coordinator
    }

    pub fn session_user(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.user_id().to_string())
    }

    /// Drop the identity binding. A flight already running finishes on its own.
    pub fn end_session(&self) {
        let previous = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            debug!("[ReconciliationEngine] session for {} ended", previous.user_id());
        }
    }

    /// Delete a remote row directly, bypassing the queue.
    pub async fn delete_remote(&self, id: &str) -> Result<()> {
        self.remote.delete_by_id(id).await
    }

    pub async fn history(&self, user_id: Option<&str>) -> Result<HistorySnapshot> {
        HistoryView::load(&self.queue, self.remote.as_ref(), user_id).await
    }

    /// Load history and, when signed in with records still pending, kick off a
    /// sync without waiting for it.
    pub async fn refresh_history(&self, user_id: Option<&str>) -> Result<HistoryRefresh> {
        let snapshot = self.history(user_id).await?;
        let sync = match user_id {
            Some(user_id) if snapshot.local_count > 0 => Some(self.request_sync(user_id)),
            _ => None,
        };
        Ok(HistoryRefresh { snapshot, sync })
    }

    /// Delete one history entry from wherever it lives.
    ///
    /// Removing a local entry while signed in also requests a sync so the rest
    /// of the queue keeps moving; the flight is returned to the caller.
    pub async fn delete_entry(
        &self,
        entry: &HistoryEntry,
        user_id: Option<&str>,
    ) -> Result<Option<SyncFlight>> {
        match entry {
            HistoryEntry::Local(record) => {
                self.remove_pending(&record.client_id).await?;
                Ok(user_id.map(|user_id| self.request_sync(user_id)))
            }
            HistoryEntry::Cloud(record) => {
                self.delete_remote(&record.id).await?;
                Ok(None)
            }
        }
    }
}
