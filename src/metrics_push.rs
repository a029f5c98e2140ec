use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::config::optional_env;
use crate::constants::PUSHGATEWAY_URL_ENV;
use crate::error::{EtlError, Result};
use crate::metrics;

const JOB_NAME: &str = "news_etl";

pub fn push_url(pushgateway_url: &str, instance: &str) -> String {
    format!(
        "{}/metrics/job/{}/instance/{}",
        pushgateway_url.trim_end_matches('/'),
        JOB_NAME,
        instance
    )
}

/// POST a Prometheus text exposition to a Pushgateway, replacing the group
/// for `instance`.
pub async fn push_snapshot(pushgateway_url: &str, instance: &str, body: String) -> Result<()> {
    let url = push_url(pushgateway_url, instance);
    let size = body.len();

    let resp = reqwest::Client::new()
        .post(&url)
        .header(CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(EtlError::PushStatus {
            url,
            status: status.as_u16(),
            body,
        });
    }

    info!(size, "Pushed metrics to Pushgateway for instance={}", instance);
    Ok(())
}

/// Render the installed recorder and push it to `NEWS_ETL_PUSHGATEWAY_URL`.
/// Does nothing when the variable is unset or no recorder is installed;
/// failures are only logged.
pub async fn push_if_configured(instance: &str) {
    let Some(base) = optional_env(PUSHGATEWAY_URL_ENV) else {
        return;
    };
    let Some(handle) = metrics::handle() else {
        warn!("No metrics recorder installed; skipping Pushgateway push");
        return;
    };

    if let Err(e) = push_snapshot(&base, instance, handle.render()).await {
        warn!("Failed to push metrics for instance={}: {}", instance, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_url_groups_by_job_and_instance() {
        assert_eq!(
            push_url("http://gw:9091/", "news_ingest"),
            "http://gw:9091/metrics/job/news_etl/instance/news_ingest"
        );
    }
}
