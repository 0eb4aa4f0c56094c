use thiserror::Error;

/// Errors surfaced by the reconciliation engine.
///
/// `Clone` so that one flight result can be handed to every attached caller.
/// A corrupt persisted queue is deliberately absent: it is read as empty and
/// never reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Local storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("Remote store rejected the request{}: {message}", http_status_suffix(.status))]
    RemoteRejected {
        status: Option<u16>,
        message: String,
    },

    #[error("Network timeout: {message}")]
    NetworkTimeout { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn http_status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl SyncError {
    pub fn storage(message: impl Into<String>) -> Self {
        SyncError::StorageUnavailable {
            message: message.into(),
        }
    }

    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::RemoteRejected {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        SyncError::NetworkTimeout {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SyncError::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed without any change
    /// on the caller's side.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::NetworkTimeout { .. } | SyncError::Network { .. } => true,
            SyncError::StorageUnavailable { .. } => true,
            SyncError::RemoteRejected { status, .. } => {
                matches!(status, Some(s) if *s >= 500 || *s == 429)
            }
            SyncError::Serialization { .. } | SyncError::Internal { .. } => false,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
