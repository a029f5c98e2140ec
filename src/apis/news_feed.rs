use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{info, instrument};

use crate::error::{EtlError, Result};
use crate::types::RawNewsRecord;

/// Client for the news feed endpoint. One GET returns the full current
/// snapshot as a JSON array; there is no paging.
pub struct NewsFeedClient {
    client: reqwest::Client,
    url: String,
}

impl NewsFeedClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_news(&self) -> Result<Vec<RawNewsRecord>> {
        let resp = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EtlError::UpstreamStatus {
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let records: Vec<RawNewsRecord> = serde_json::from_slice(&bytes)?;
        info!("Fetched {} news records ({} bytes)", records.len(), bytes.len());
        Ok(records)
    }
}
