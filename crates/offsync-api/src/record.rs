//! Record shapes exchanged between the local queue and the remote table

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Domain fields of one computed estimate.
///
/// The engine never looks inside; it only carries the payload from the local
/// queue to the remote table verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub lmp_date: NaiveDate,
    pub cycle_length: u32,
    pub gest_age_days: u32,
    pub weeks: u32,
    pub days: u32,
    pub trimester: u8,
    pub edd_date: NaiveDate,
    #[serde(default)]
    pub recommendation_text: Option<String>,
}

/// A locally created record that has not been confirmed synced yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: RecordPayload,
}

impl PendingRecord {
    /// Create a record with a freshly generated client id, stamped now.
    pub fn new(payload: RecordPayload) -> Self {
        Self {
            client_id: ClientId::generate(),
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn with_client_id(client_id: impl Into<String>, payload: RecordPayload) -> Self {
        Self {
            client_id: client_id.into(),
            created_at: Utc::now(),
            payload,
        }
    }

    /// Row sent to the remote table for this record under `user_id`.
    pub fn to_upsert_row(&self, user_id: &str) -> UpsertRow {
        UpsertRow {
            user_id: user_id.to_string(),
            client_id: self.client_id.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// Wire row for an upsert keyed on `(user_id, client_id)`.
///
/// Carries no `created_at`: on conflict the server keeps the timestamp of the
/// first write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertRow {
    pub user_id: String,
    pub client_id: String,
    #[serde(flatten)]
    pub payload: RecordPayload,
}

/// A row of the remote table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    #[serde(flatten)]
    pub payload: RecordPayload,
    pub created_at: DateTime<Utc>,
}

/// Aggregate result of one sync flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Records submitted to the remote store across all passes. A batch resent
    /// after an interrupted clear is counted again.
    pub synced: usize,
    /// Drain passes that issued an upsert.
    pub passes: usize,
}

/// Client-side id generator: `{unix_millis}_{random hex}`.
pub struct ClientId;

impl ClientId {
    pub fn generate() -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: u64 = rand::thread_rng().gen();
        format!("{}_{:x}", millis, suffix)
    }
}
