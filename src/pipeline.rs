use bytes::Bytes;
use chrono::{DateTime, Utc};
use ::metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::apis::NewsFeedClient;
use crate::db::NewsSink;
use crate::error::{EtlError, Result};
use crate::gateway::ObjectStoreClient;
use crate::metrics::{
    LAST_RUN_SUCCESS, LAST_RUN_TIMESTAMP_SECONDS, RECORDS_FETCHED_TOTAL, ROWS_INSERTED_TOTAL,
    ROWS_SKIPPED_TOTAL, RUNS_TOTAL, RUN_DURATION_SECONDS, STAGE_FAILURES_TOTAL,
};
use crate::normalize::normalize_news;
use crate::parquet_out::{batch_key, encode_parquet, news_to_record_batch, ParquetOptions};
use crate::types::NewsRecord;

/// Where a news ingest run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowStage {
    Fetching,
    Normalizing,
    WritingColumnar,
    UpsertingRelational,
    Done,
}

impl FlowStage {
    /// Stages a run can fail in.
    pub const FAILABLE: [FlowStage; 4] = [
        FlowStage::Fetching,
        FlowStage::Normalizing,
        FlowStage::WritingColumnar,
        FlowStage::UpsertingRelational,
    ];

    /// Metric label value.
    pub fn label(&self) -> &'static str {
        match self {
            FlowStage::Fetching => "fetching",
            FlowStage::Normalizing => "normalizing",
            FlowStage::WritingColumnar => "writing_columnar",
            FlowStage::UpsertingRelational => "upserting_relational",
            FlowStage::Done => "done",
        }
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStage::Fetching => "fetching",
            FlowStage::Normalizing => "normalizing",
            FlowStage::WritingColumnar => "writing columnar batch",
            FlowStage::UpsertingRelational => "upserting relational rows",
            FlowStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Result of a complete news ingest run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub fetched: usize,
    pub object_key: String,
    pub inserted: u64,
    pub skipped: u64,
    pub duration: Duration,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fetch → normalize → Parquet batch in object storage → Postgres upsert.
///
/// Steps run strictly in order. Nothing is undone when a later step fails:
/// a batch already written to the bucket stays there.
pub struct NewsIngestFlow {
    feed: NewsFeedClient,
    objects: Arc<ObjectStoreClient>,
    bucket: String,
    prefix: String,
    sink: Arc<dyn NewsSink>,
    clock: Clock,
}

fn at_stage<T>(stage: FlowStage, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        counter!(STAGE_FAILURES_TOTAL, "stage" => stage.label()).increment(1);
        gauge!(LAST_RUN_SUCCESS).set(0.0);
        gauge!(LAST_RUN_TIMESTAMP_SECONDS).set(Utc::now().timestamp() as f64);
        error!(%stage, kind = %e.kind(), "News ingest failed: {}", e);
        EtlError::Flow {
            stage,
            source: Box::new(e),
        }
    })
}

impl NewsIngestFlow {
    pub fn new(
        feed: NewsFeedClient,
        objects: Arc<ObjectStoreClient>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        sink: Arc<dyn NewsSink>,
    ) -> Self {
        Self {
            feed,
            objects,
            bucket: bucket.into(),
            prefix: prefix.into(),
            sink,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used to partition and name batches.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Encode `records` as one gzip Parquet file and store it under a fresh
    /// time-partitioned key. Returns the key.
    pub async fn write_columnar(&self, records: &[NewsRecord]) -> Result<String> {
        let now = (self.clock)();
        let key = batch_key(&self.prefix, now);

        let batch = news_to_record_batch(records)?;
        let bytes = encode_parquet(&batch, &ParquetOptions::news())?;
        let size = bytes.len();

        self.objects
            .put_new(&self.bucket, &key, Bytes::from(bytes))
            .await?;
        info!(bucket = %self.bucket, size, "Stored {} records at {}", records.len(), key);
        Ok(key)
    }

    pub async fn upsert_relational(&self, records: &[NewsRecord]) -> Result<u64> {
        self.sink.upsert_news(records).await
    }

    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self) -> Result<IngestReport> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        counter!(RUNS_TOTAL).increment(1);
        let started = Instant::now();

        info!("📡 Fetching news from {}", self.feed.url());
        let raw = at_stage(FlowStage::Fetching, self.feed.fetch_news().await)?;
        let fetched = raw.len();
        counter!(RECORDS_FETCHED_TOTAL).increment(fetched as u64);
        if fetched == 0 {
            warn!("News feed returned no records; writing an empty batch");
        }

        info!("🔧 Normalizing {} records", fetched);
        let records = at_stage(FlowStage::Normalizing, normalize_news(raw))?;

        info!("💾 Writing Parquet batch");
        let object_key = at_stage(FlowStage::WritingColumnar, self.write_columnar(&records).await)?;

        info!("🗄️ Upserting into news_items");
        let inserted = at_stage(
            FlowStage::UpsertingRelational,
            self.upsert_relational(&records).await,
        )?;
        let skipped = (records.len() as u64).saturating_sub(inserted);
        counter!(ROWS_INSERTED_TOTAL).increment(inserted);
        counter!(ROWS_SKIPPED_TOTAL).increment(skipped);

        let duration = started.elapsed();
        histogram!(RUN_DURATION_SECONDS).record(duration.as_secs_f64());
        gauge!(LAST_RUN_SUCCESS).set(1.0);
        gauge!(LAST_RUN_TIMESTAMP_SECONDS).set(Utc::now().timestamp() as f64);
        info!(
            stage = %FlowStage::Done,
            "✅ Ingested {} records: {} inserted, {} already present",
            fetched,
            inserted,
            skipped
        );

        Ok(IngestReport {
            run_id,
            fetched,
            object_key,
            inserted,
            skipped,
            duration,
        })
    }
}
