use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::types::NewsRecord;

const UPSERT_NEWS_SQL: &str = r#"
    INSERT INTO news_items (id, source, title, url, icon, image, time, symbols, first_price, info, suggestions)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::json, $10::json, $11::json)
    ON CONFLICT (id) DO NOTHING
"#;

/// Relational destination for normalized news.
#[async_trait]
pub trait NewsSink: Send + Sync {
    /// Insert every record whose id is not already stored; existing ids are
    /// left untouched. Returns how many rows were actually inserted.
    async fn upsert_news(&self, records: &[NewsRecord]) -> Result<u64>;
}

/// JSON text for a structured column. Absent values become JSON `null`.
pub fn json_column(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "null".to_string())
}

/// Postgres sink. Each call opens its own connection, runs the whole batch in
/// one transaction and closes the connection again.
pub struct PostgresNewsSink {
    database_url: String,
}

impl PostgresNewsSink {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl NewsSink for PostgresNewsSink {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_news(&self, records: &[NewsRecord]) -> Result<u64> {
        let mut conn = PgConnection::connect(&self.database_url).await?;
        let mut tx = conn.begin().await?;

        let mut inserted = 0;
        for r in records {
            let done = sqlx::query(UPSERT_NEWS_SQL)
                .bind(&r.id)
                .bind(&r.source)
                .bind(&r.title)
                .bind(&r.url)
                .bind(&r.icon)
                .bind(&r.image)
                .bind(r.time)
                .bind(&r.symbols)
                .bind(json_column(&r.first_price))
                .bind(json_column(&r.info))
                .bind(json_column(&r.suggestions))
                .execute(&mut *tx)
                .await?;
            inserted += done.rows_affected();
        }

        tx.commit().await?;
        conn.close().await?;

        info!(
            "Upserted {} news rows ({} already present)",
            inserted,
            (records.len() as u64).saturating_sub(inserted)
        );
        Ok(inserted)
    }
}

/// In-memory sink with the same skip-on-conflict behaviour, for development
/// and tests.
#[derive(Default)]
pub struct InMemoryNewsSink {
    rows: Mutex<HashMap<String, NewsRecord>>,
}

impl InMemoryNewsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<NewsRecord> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl NewsSink for InMemoryNewsSink {
    async fn upsert_news(&self, records: &[NewsRecord]) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut inserted = 0;
        for r in records {
            if !rows.contains_key(&r.id) {
                rows.insert(r.id.clone(), r.clone());
                inserted += 1;
            }
        }
        debug!("Stored {} of {} news rows in memory", inserted, records.len());
        Ok(inserted)
    }
}
