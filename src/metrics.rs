//! Prometheus recorder behind the `metrics` facade.
//!
//! Batch runs have nobody scraping them, so the recorder is installed without
//! an HTTP listener and the handle is kept for rendering a snapshot that
//! `metrics_push` sends to a Pushgateway.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::pipeline::FlowStage;

pub const RUNS_TOTAL: &str = "news_etl_runs_total";
pub const RECORDS_FETCHED_TOTAL: &str = "news_etl_records_fetched_total";
pub const ROWS_INSERTED_TOTAL: &str = "news_etl_rows_inserted_total";
pub const ROWS_SKIPPED_TOTAL: &str = "news_etl_rows_skipped_total";
pub const STAGE_FAILURES_TOTAL: &str = "news_etl_stage_failures_total";
pub const RUN_DURATION_SECONDS: &str = "news_etl_run_duration_seconds";
pub const LAST_RUN_SUCCESS: &str = "news_etl_last_run_success";
pub const LAST_RUN_TIMESTAMP_SECONDS: &str = "news_etl_last_run_timestamp_seconds";

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder and register the news_etl metrics.
///
/// Idempotent. Returns `None` if another recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle.clone());
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_metrics();
            let handle = HANDLE.get_or_init(|| handle).clone();
            info!("Prometheus recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

/// Handle of the recorder installed by [`init_metrics`], if any.
pub fn handle() -> Option<PrometheusHandle> {
    HANDLE.get().cloned()
}

/// Describe every metric and start the counters at zero, so a snapshot
/// always carries the full set even when a run stops early.
pub fn register_metrics() {
    ::metrics::describe_counter!(RUNS_TOTAL, "News ingest runs started");
    ::metrics::describe_counter!(RECORDS_FETCHED_TOTAL, "Records returned by the news feed");
    ::metrics::describe_counter!(ROWS_INSERTED_TOTAL, "Rows newly inserted into news_items");
    ::metrics::describe_counter!(ROWS_SKIPPED_TOTAL, "Rows already present in news_items");
    ::metrics::describe_counter!(STAGE_FAILURES_TOTAL, "Runs aborted, by failing stage");
    ::metrics::describe_histogram!(
        RUN_DURATION_SECONDS,
        ::metrics::Unit::Seconds,
        "Wall time of successful runs"
    );
    ::metrics::describe_gauge!(LAST_RUN_SUCCESS, "1 if the last run finished, 0 if it failed");
    ::metrics::describe_gauge!(
        LAST_RUN_TIMESTAMP_SECONDS,
        ::metrics::Unit::Seconds,
        "Unix time the last run ended"
    );

    for name in [
        RUNS_TOTAL,
        RECORDS_FETCHED_TOTAL,
        ROWS_INSERTED_TOTAL,
        ROWS_SKIPPED_TOTAL,
    ] {
        ::metrics::counter!(name).absolute(0);
    }
    for stage in FlowStage::FAILABLE {
        ::metrics::counter!(STAGE_FAILURES_TOTAL, "stage" => stage.label()).absolute(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_metrics_render_before_any_run() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, register_metrics);

        let text = handle.render();
        assert!(text.contains("news_etl_runs_total 0"));
        assert!(text.contains("news_etl_stage_failures_total{stage=\"fetching\"} 0"));
        assert!(text.contains("news_etl_stage_failures_total{stage=\"upserting_relational\"} 0"));
    }
}
