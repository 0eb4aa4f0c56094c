use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Storage key the pending queue has always been persisted under.
pub const DEFAULT_QUEUE_KEY: &str = "local_pregnancy_history_v1";

/// Configuration for [`crate::api::ReconciliationEngine::open`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key the serialized queue is stored under.
    pub queue_key: String,
    /// Directory for the file-backed queue. `None` keeps the queue in memory.
    pub storage_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            storage_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn new(storage_dir: Option<PathBuf>) -> Self {
        Self {
            storage_dir,
            ..Self::default()
        }
    }

    pub fn with_queue_key(mut self, key: impl Into<String>) -> Self {
        self.queue_key = key.into();
        self
    }
}
