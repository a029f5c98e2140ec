//! Runs against a real Postgres. Set NEON_CONN and run with `--ignored`.

use chrono::{TimeZone, Utc};
use serde_json::json;
use sqlx::{Connection, PgConnection};
use uuid::Uuid;

use news_etl::db::{NewsSink, PostgresNewsSink};
use news_etl::types::NewsRecord;

const CREATE_NEWS_ITEMS: &str = r#"
    CREATE TABLE IF NOT EXISTS news_items (
        id TEXT PRIMARY KEY,
        source TEXT,
        title TEXT,
        url TEXT,
        icon TEXT,
        image TEXT,
        time TIMESTAMPTZ,
        symbols TEXT[],
        first_price JSON,
        info JSON,
        suggestions JSON
    )
"#;

fn record(id: String) -> NewsRecord {
    NewsRecord {
        id,
        source: Some("Blogs".to_string()),
        title: Some("ETH ETF approved".to_string()),
        url: Some("https://example.com/eth".to_string()),
        icon: None,
        image: None,
        time: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        symbols: Some(vec![Some("ETH".to_string()), None]),
        first_price: Some(json!({"ETH": 2000.1})),
        info: None,
        suggestions: Some(json!([{"coin": "ETH"}])),
    }
}

#[tokio::test]
#[ignore]
async fn upserting_the_same_batch_twice_inserts_once() {
    let Ok(url) = std::env::var("NEON_CONN") else {
        eprintln!("NEON_CONN not set; skipping");
        return;
    };

    let mut conn = PgConnection::connect(&url).await.unwrap();
    sqlx::query(CREATE_NEWS_ITEMS).execute(&mut conn).await.unwrap();

    let run = Uuid::new_v4();
    let batch = vec![record(format!("{run}-a")), record(format!("{run}-b"))];
    let sink = PostgresNewsSink::new(url.clone());

    assert_eq!(sink.upsert_news(&batch).await.unwrap(), 2);
    assert_eq!(sink.upsert_news(&batch).await.unwrap(), 0);

    let (count, null_info): (i64, bool) = sqlx::query_as(
        "SELECT COUNT(*), bool_and(info::text = 'null') FROM news_items WHERE id LIKE $1",
    )
    .bind(format!("{run}-%"))
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert_eq!(count, 2);
    assert!(null_info);

    sqlx::query("DELETE FROM news_items WHERE id LIKE $1")
        .bind(format!("{run}-%"))
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
}
