//! Coalescing sync coordinator
//!
//! One coordinator is bound to one identity. At most one flight runs per
//! coordinator; requests made while it runs attach to the same shared result
//! and mark a re-run, so the flight drains the queue again before finishing.
//!
//! A flight loop pass is strictly `list → upsert → remove_synced`. Deciding
//! whether to loop again and releasing the flight slot happen in the same
//! critical section as request registration, so every request is either
//! served by a pass that starts after it or starts a new flight.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::core::PendingQueue;
use crate::sync::RemoteStore;
use offsync_api::{Result, SyncError, SyncOutcome};

/// Handle on an in-progress (or finished) flight. Cloneable; every clone
/// resolves to the same outcome.
pub type SyncFlight = Shared<BoxFuture<'static, Result<SyncOutcome>>>;

#[derive(Default)]
struct FlightState {
    flight: Option<SyncFlight>,
    rerun_requested: bool,
}

struct FlightContext {
    user_id: String,
    queue: Arc<PendingQueue>,
    remote: Arc<dyn RemoteStore>,
    drain_lock: Arc<tokio::sync::Mutex<()>>,
    state: Arc<Mutex<FlightState>>,
}

pub struct SyncCoordinator {
    ctx: Arc<FlightContext>,
}

impl SyncCoordinator {
    /// `drain_lock` is shared by every coordinator draining the same queue so
    /// that flights of different identities never overlap.
    pub fn new(
        user_id: impl Into<String>,
        queue: Arc<PendingQueue>,
        remote: Arc<dyn RemoteStore>,
        drain_lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Self {
        Self {
            ctx: Arc::new(FlightContext {
                user_id: user_id.into(),
                queue,
                remote,
                drain_lock,
                state: Arc::new(Mutex::new(FlightState::default())),
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.ctx.user_id
    }

    pub fn is_idle(&self) -> bool {
        self.ctx.lock_state().flight.is_none()
    }

    /// Request that the queue be drained to the remote store.
    ///
    /// Registration happens immediately, before the returned future is
    /// polled. Must be called from within a tokio runtime: a new flight is
    /// spawned so it runs to completion even if every caller drops its handle.
    pub fn request_sync(&self) -> SyncFlight {
        let mut guard = self.ctx.lock_state();
        let state = &mut *guard;
        if let Some(flight) = &state.flight {
            state.rerun_requested = true;
            debug!(
                "[SyncCoordinator] flight active for {}, re-run requested",
                self.ctx.user_id
            );
            return flight.clone();
        }

        let ctx = Arc::clone(&self.ctx);
        let handle = tokio::spawn(async move { ctx.run_flight().await });
        let flight: SyncFlight = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(SyncError::internal(format!("sync flight aborted: {}", e))),
            }
        }
        .boxed()
        .shared();

        state.flight = Some(flight.clone());
        state.rerun_requested = false;
        debug!("[SyncCoordinator] started flight for {}", self.ctx.user_id);
        flight
    }
}

impl FlightContext {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, FlightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_slot(&self) {
        let mut state = self.lock_state();
        state.flight = None;
        state.rerun_requested = false;
    }

    #[tracing::instrument(name = "sync.flight", skip(self), fields(user_id = %self.user_id))]
    async fn run_flight(&self) -> Result<SyncOutcome> {
        let mut slot = SlotGuard {
            ctx: self,
            armed: true,
        };
        let _drain = self.drain_lock.lock().await;
        let mut outcome = SyncOutcome::default();

        loop {
            match self.drain_once().await {
                Ok(0) => {}
                Ok(count) => {
                    outcome.synced += count;
                    outcome.passes += 1;
                }
                Err(e) => {
                    slot.armed = false;
                    self.release_slot();
                    warn!(
                        "[SyncCoordinator] flight for {} failed after {} synced: {}",
                        self.user_id, outcome.synced, e
                    );
                    return Err(e);
                }
            }

            let mut state = self.lock_state();
            if state.rerun_requested {
                state.rerun_requested = false;
                debug!("[SyncCoordinator] re-running drain for {}", self.user_id);
                continue;
            }
            state.flight = None;
            slot.armed = false;
            break;
        }

        info!(
            "[SyncCoordinator] flight for {} done: synced={} passes={}",
            self.user_id, outcome.synced, outcome.passes
        );
        Ok(outcome)
    }

    /// One pass. Returns the number of records submitted; an empty queue
    /// makes no remote call.
    async fn drain_once(&self) -> Result<usize> {
        let batch = self.queue.list().await?;
        if batch.is_empty() {
            return Ok(0);
        }

        self.remote.upsert(&batch, &self.user_id).await?;

        let client_ids: Vec<String> = batch.iter().map(|r| r.client_id.clone()).collect();
        self.queue.remove_synced(&client_ids).await?;
        debug!(
            "[SyncCoordinator] pass upserted {} records to {}",
            batch.len(),
            self.remote.store_id()
        );
        Ok(batch.len())
    }
}

/// Frees the flight slot if the flight unwinds or is cancelled before it
/// releases the slot itself.
struct SlotGuard<'a> {
    ctx: &'a FlightContext,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                "[SyncCoordinator] flight for {} aborted, releasing slot",
                self.ctx.user_id
            );
            self.ctx.release_slot();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use crate::sync::InMemoryRemoteStore;
    use chrono::NaiveDate;
    use offsync_api::{PendingRecord, RecordPayload};

    fn record(client_id: &str) -> PendingRecord {
        PendingRecord::with_client_id(
            client_id,
            RecordPayload {
                lmp_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                cycle_length: 28,
                gest_age_days: 14,
                weeks: 2,
                days: 0,
                trimester: 1,
                edd_date: NaiveDate::from_ymd_opt(2025, 2, 5).unwrap(),
                recommendation_text: None,
            },
        )
    }

    fn setup() -> (Arc<PendingQueue>, Arc<InMemoryRemoteStore>, SyncCoordinator) {
        let queue = Arc::new(PendingQueue::new(
            Arc::new(MemoryKeyValueStore::new()),
            "coordinator_test",
        ));
        let remote = Arc::new(InMemoryRemoteStore::new());
        let coordinator = SyncCoordinator::new(
            "u1",
            queue.clone(),
            remote.clone(),
            Arc::new(tokio::sync::Mutex::new(())),
        );
        (queue, remote, coordinator)
    }

    #[tokio::test]
    async fn test_empty_queue_makes_no_remote_call() {
        let (_, remote, coordinator) = setup();

        let outcome = coordinator.request_sync().await.unwrap();
        assert_eq!(outcome.synced, 0);
        assert_eq!(outcome.passes, 0);
        assert_eq!(remote.upsert_calls(), 0);
        assert!(coordinator.is_idle());
    }

    #[tokio::test]
    async fn test_attached_request_shares_flight_and_triggers_rerun() {
        let (queue, remote, coordinator) = setup();
        queue.append(record("a")).await.unwrap();
        remote.pause_upserts();

        let first = coordinator.request_sync();
        remote.wait_for_upserts(1).await;
        assert!(!coordinator.is_idle());

        queue.append(record("b")).await.unwrap();
        let second = coordinator.request_sync();
        remote.resume_upserts();

        let (r1, r2) = tokio::join!(first, second);
        let (r1, r2) = (r1.unwrap(), r2.unwrap());
        assert_eq!(r1, r2);
        assert_eq!(r1.synced, 2);
        assert_eq!(r1.passes, 2);
        assert_eq!(remote.upsert_calls(), 2);
        assert_eq!(remote.max_concurrent_upserts(), 1);
        assert!(coordinator.is_idle());
    }

    #[tokio::test]
    async fn test_failure_releases_slot_for_retry() {
        let (queue, remote, coordinator) = setup();
        queue.append(record("a")).await.unwrap();
        remote.fail_next_upsert(SyncError::timeout("no response within 20s"));

        let err = coordinator.request_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::NetworkTimeout { .. }));
        assert!(coordinator.is_idle());
        assert_eq!(queue.list().await.unwrap().len(), 1);

        let outcome = coordinator.request_sync().await.unwrap();
        assert_eq!(outcome.synced, 1);
        assert!(queue.list().await.unwrap().is_empty());
    }

    async fn wait_until_idle(coordinator: &SyncCoordinator) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !coordinator.is_idle() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("flight should finish");
    }

    #[tokio::test]
    async fn test_flight_completes_when_caller_drops_handle() {
        let (queue, remote, coordinator) = setup();
        queue.append(record("a")).await.unwrap();
        remote.pause_upserts();

        drop(coordinator.request_sync());
        remote.wait_for_upserts(1).await;
        remote.resume_upserts();
        wait_until_idle(&coordinator).await;

        assert_eq!(remote.upsert_calls(), 1);
        assert_eq!(remote.rows().len(), 1);
        assert!(queue.list().await.unwrap().is_empty());

        let outcome = coordinator.request_sync().await.unwrap();
        assert_eq!(outcome.synced, 0);
        assert_eq!(remote.upsert_calls(), 1);
    }

    /// Panics on the first upsert, then delegates.
    struct PanicOnceRemote {
        inner: InMemoryRemoteStore,
        panicked: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl RemoteStore for PanicOnceRemote {
        async fn upsert(&self, rows: &[PendingRecord], user_id: &str) -> Result<()> {
            if !self
                .panicked
                .swap(true, std::sync::atomic::Ordering::SeqCst)
            {
                panic!("remote exploded mid-upsert");
            }
            self.inner.upsert(rows, user_id).await
        }

        async fn select(&self, user_id: &str) -> Result<Vec<offsync_api::RemoteRecord>> {
            self.inner.select(user_id).await
        }

        async fn delete_by_id(&self, id: &str) -> Result<()> {
            self.inner.delete_by_id(id).await
        }

        fn store_id(&self) -> &str {
            "panic-once"
        }
    }

    #[tokio::test]
    async fn test_panicking_flight_releases_slot_for_retry() {
        let queue = Arc::new(PendingQueue::new(
            Arc::new(MemoryKeyValueStore::new()),
            "coordinator_test",
        ));
        let remote = Arc::new(PanicOnceRemote {
            inner: InMemoryRemoteStore::new(),
            panicked: std::sync::atomic::AtomicBool::new(false),
        });
        let coordinator = SyncCoordinator::new(
            "u1",
            queue.clone(),
            remote.clone(),
            Arc::new(tokio::sync::Mutex::new(())),
        );
        queue.append(record("a")).await.unwrap();

        let err = coordinator.request_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Internal { .. }));
        assert!(coordinator.is_idle());
        assert_eq!(queue.list().await.unwrap().len(), 1);

        let outcome = coordinator.request_sync().await.unwrap();
        assert_eq!(outcome.synced, 1);
        assert!(queue.list().await.unwrap().is_empty());
        assert_eq!(remote.inner.rows().len(), 1);
    }
}
