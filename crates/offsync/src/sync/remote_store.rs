//! Remote store boundary
//!
//! The engine consumes the remote table only through this trait. Concrete
//! transports live elsewhere (e.g. `offsync-rest`); `InMemoryRemoteStore`
//! is the in-process implementation used by tests and offline hosts.

use async_trait::async_trait;

use offsync_api::{PendingRecord, RemoteRecord, Result};

/// Keyed remote table addressed by `(user_id, client_id)`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert or overwrite `rows` for `user_id` in a single request.
    ///
    /// Idempotent on `(user_id, client_id)`: repeating the call with the same
    /// rows leaves the table unchanged.
    async fn upsert(&self, rows: &[PendingRecord], user_id: &str) -> Result<()>;

    /// All rows of `user_id`, newest `created_at` first.
    async fn select(&self, user_id: &str) -> Result<Vec<RemoteRecord>>;

    async fn delete_by_id(&self, id: &str) -> Result<()>;

    /// Identifier used in logs (e.g. "memory", "rest:pregnancy_history").
    fn store_id(&self) -> &str;
}
