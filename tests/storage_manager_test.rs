use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use news_etl::config::{StorageConfig, StorageMode};
use news_etl::error::EtlError;
use news_etl::gateway::ObjectStoreClient;
use news_etl::storage::{LoadOutcome, StorageManager};

fn config_toml(mode: &str, base: &Path) -> String {
    format!(
        r#"
storage_mode = "{mode}"

[local]
base_path = "{base}"
temp_path = "{base}/temp"
[local.paths]
token_unlocks = "token_unlocks"

[s3]
default_bucket = "pipeline-data"
[s3.paths]
token_unlocks = "raw/token_unlocks/"

[parquet]
compression = "snappy"
row_group_size = 100
"#,
        base = base.display()
    )
}

fn unlocks() -> RecordBatch {
    let tokens: ArrayRef = Arc::new(StringArray::from(vec!["ARB", "OP", "SUI"]));
    let amounts: ArrayRef = Arc::new(Int64Array::from(vec![1_000, 250, 42]));
    RecordBatch::try_from_iter(vec![("token", tokens), ("amount", amounts)]).unwrap()
}

#[tokio::test]
async fn local_mode_saves_and_loads_a_table() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&config_toml("local", dir.path())).unwrap();
    let manager = StorageManager::new(config, None).unwrap();

    assert_eq!(manager.mode(), StorageMode::Local);
    assert!(dir.path().join("token_unlocks").is_dir());

    let saved = manager
        .save(&unlocks(), "token_unlocks", "2024-03.parquet")
        .await
        .unwrap();
    assert!(Path::new(&saved).exists());

    let batch = match manager.load("token_unlocks", "2024-03.parquet").await {
        LoadOutcome::Found(batch) => batch,
        other => panic!("expected a table, got {other:?}"),
    };
    assert_eq!(batch.num_rows(), 3);
    assert_eq!(batch.schema().field(0).name(), "token");
    let amounts = batch
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(amounts.value(2), 42);
}

#[tokio::test]
async fn local_mode_missing_file_is_not_found() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&config_toml("local", dir.path())).unwrap();
    let manager = StorageManager::new(config, None).unwrap();

    let outcome = manager.load("token_unlocks", "absent.parquet").await;
    assert!(matches!(outcome, LoadOutcome::NotFound));
}

#[tokio::test]
async fn unknown_data_type_fails_both_ways() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&config_toml("local", dir.path())).unwrap();
    let manager = StorageManager::new(config, None).unwrap();

    let err = manager.save(&unlocks(), "prices", "p.parquet").await.unwrap_err();
    assert!(matches!(err, EtlError::UnknownDataType { .. }));

    let outcome = manager.load("prices", "p.parquet").await;
    assert!(matches!(
        outcome,
        LoadOutcome::Failed(EtlError::UnknownDataType { .. })
    ));
    assert!(outcome.into_option().is_none());
}

#[tokio::test]
async fn corrupt_local_file_is_a_failure_not_absence() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&config_toml("local", dir.path())).unwrap();
    let manager = StorageManager::new(config, None).unwrap();

    std::fs::write(dir.path().join("token_unlocks/bad.parquet"), b"not parquet").unwrap();
    let outcome = manager.load("token_unlocks", "bad.parquet").await;
    assert!(matches!(outcome, LoadOutcome::Failed(_)));
}

#[test]
fn s3_mode_requires_an_object_store_client() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&config_toml("s3", dir.path())).unwrap();
    assert!(matches!(
        StorageManager::new(config, None),
        Err(EtlError::Config(_))
    ));
}

#[tokio::test]
async fn s3_mode_round_trips_through_the_default_bucket() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&config_toml("s3", dir.path())).unwrap();
    let store = Arc::new(InMemory::new());
    let objects = Arc::new(ObjectStoreClient::default().with_backend("pipeline-data", store.clone()));
    let manager = StorageManager::new(config, Some(objects)).unwrap();

    let key = manager
        .save(&unlocks(), "token_unlocks", "2024-03.parquet")
        .await
        .unwrap();
    assert_eq!(key, "raw/token_unlocks/2024-03.parquet");
    store.head(&ObjectPath::from(key.as_str())).await.unwrap();
    assert!(!dir.path().join("temp/2024-03.parquet").exists());

    let loaded = manager
        .load("token_unlocks", "2024-03.parquet")
        .await
        .into_option()
        .unwrap();
    assert_eq!(loaded.num_rows(), 3);
    assert!(!dir.path().join("temp/2024-03.parquet").exists());

    let missing = manager.load("token_unlocks", "2023-01.parquet").await;
    assert!(matches!(missing, LoadOutcome::NotFound));
}

#[test]
fn connect_in_local_mode_needs_no_credentials() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&config_toml("local", dir.path())).unwrap();
    let manager = StorageManager::connect(config).unwrap();
    assert_eq!(
        manager.path_for("token_unlocks").unwrap(),
        dir.path().join("token_unlocks").to_string_lossy()
    );
}
