use offsync_api::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        SyncError::storage(err.to_string())
    }
}
