use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::config::required_env;
use crate::constants::{SUPABASE_KEY_ENV, SUPABASE_URL_ENV};
use crate::error::{EtlError, Result};

/// Inserts metadata rows into a Supabase project through its PostgREST API.
///
/// Config via env:
/// - SUPABASE_URL (e.g., https://xyzcompany.supabase.co)
/// - SUPABASE_KEY (service role or anon key)
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = required_env(SUPABASE_URL_ENV)?;
        let key = required_env(SUPABASE_KEY_ENV)?;
        Ok(Self::new(url, key))
    }

    /// Insert one record; returns the row as stored, or `None` when the
    /// backend reports nothing back.
    pub async fn insert(&self, table: &str, record: &Value) -> Result<Option<Value>> {
        let rows = self.post_rows("inserting", table, record).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert many records in one request. All-or-nothing from the caller's
    /// point of view: a failure carries no per-record detail.
    pub async fn batch_insert(&self, table: &str, records: &[Value]) -> Result<Vec<Value>> {
        let body = Value::Array(records.to_vec());
        self.post_rows("batch inserting", table, &body).await
    }

    async fn post_rows(&self, operation: &'static str, table: &str, body: &Value) -> Result<Vec<Value>> {
        let endpoint = format!("{}/rest/v1/{}", self.base_url, table);
        let transport = |source| EtlError::MetadataTransport {
            operation,
            table: table.to_string(),
            source,
        };

        let resp = self
            .client
            .post(&endpoint)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(EtlError::MetadataStatus {
                operation,
                table: table.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(table, status = status.as_u16(), "Metadata insert accepted");
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: Value = serde_json::from_str(&text).map_err(|source| EtlError::MetadataDecode {
            operation,
            table: table.to_string(),
            source,
        })?;
        match parsed {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }
}
