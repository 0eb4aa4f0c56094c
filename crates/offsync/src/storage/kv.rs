use crate::storage::Result;
use async_trait::async_trait;

/// Durable key → string store.
///
/// Individual calls are atomic per key but there are no transactions:
/// read-modify-write sequences must be serialized by the caller.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
