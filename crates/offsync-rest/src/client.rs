use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use tracing::{debug, error, info};

use crate::config::RestConfig;
use offsync::sync::RemoteStore;
use offsync_api::{PendingRecord, RemoteRecord, Result, SyncError, UpsertRow};

const MAX_ERROR_BODY_CHARS: usize = 500;

/// `RemoteStore` over a PostgREST table with a unique `(user_id, client_id)`
/// index. One HTTP request per operation, no retries.
pub struct RestRemoteStore {
    config: RestConfig,
    client: reqwest::Client,
    store_id: String,
}

impl RestRemoteStore {
    pub fn new(config: RestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::internal(format!("Failed to create HTTP client: {}", e)))?;
        let store_id = format!("rest:{}", config.table);
        Ok(Self {
            config,
            client,
            store_id,
        })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.config.table_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer_token())
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<String> {
        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(e, operation))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, operation))?;

        if !status.is_success() {
            error!(
                "[RestRemoteStore] {} failed with HTTP {}",
                operation,
                status.as_u16()
            );
            return Err(SyncError::rejected(
                Some(status.as_u16()),
                truncate_body(&body),
            ));
        }
        Ok(body)
    }
}

fn map_transport_error(e: reqwest::Error, operation: &str) -> SyncError {
    if e.is_timeout() {
        SyncError::timeout(format!("{} timed out: {}", operation, e))
    } else if e.is_decode() {
        SyncError::Serialization {
            message: format!("{}: undecodable response: {}", operation, e),
        }
    } else if e.is_connect() {
        SyncError::Network {
            message: format!("{}: connection error: {}", operation, e),
        }
    } else {
        SyncError::Network {
            message: format!("{}: {}", operation, e),
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    #[tracing::instrument(name = "remote.rest.upsert", skip(self, rows), fields(row_count = rows.len()))]
    async fn upsert(&self, rows: &[PendingRecord], user_id: &str) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let payload: Vec<UpsertRow> = rows.iter().map(|r| r.to_upsert_row(user_id)).collect();
        let request = self
            .request(Method::POST)
            .query(&[("on_conflict", "user_id,client_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&payload);

        self.send(request, "upsert").await?;
        info!(
            "[RestRemoteStore] upserted {} rows into {}",
            rows.len(),
            self.config.table
        );
        Ok(())
    }

    #[tracing::instrument(name = "remote.rest.select", skip(self))]
    async fn select(&self, user_id: &str) -> Result<Vec<RemoteRecord>> {
        let user_filter = format!("eq.{}", user_id);
        let request = self.request(Method::GET).query(&[
            ("select", "*"),
            ("user_id", user_filter.as_str()),
            ("order", "created_at.desc"),
        ]);

        let body = self.send(request, "select").await?;
        let rows: Vec<RemoteRecord> = serde_json::from_str(&body)?;
        debug!("[RestRemoteStore] selected {} rows", rows.len());
        Ok(rows)
    }

    #[tracing::instrument(name = "remote.rest.delete", skip(self))]
    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let id_filter = format!("eq.{}", id);
        let request = self
            .request(Method::DELETE)
            .query(&[("id", id_filter.as_str())]);

        self.send(request, "delete").await?;
        Ok(())
    }

    fn store_id(&self) -> &str {
        &self.store_id
    }
}
