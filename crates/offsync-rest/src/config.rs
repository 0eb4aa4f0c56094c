use serde::Deserialize;

pub const DEFAULT_TABLE: &str = "pregnancy_history";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Connection settings for a PostgREST-style table endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`. `/rest/v1/{table}` is appended.
    pub base_url: String,
    /// Public API key sent as `apikey`.
    pub api_key: String,
    /// Session token of the signed-in user. Falls back to `api_key` when absent.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    /// Bound on each request so a stalled call cannot hold the drain forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
            table: default_table(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table
        )
    }

    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}
