use arrow::record_batch::RecordBatch;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{StorageConfig, StorageMode};
use crate::constants::STORAGE_OBJECT_STORE_PREFIX;
use crate::error::{EtlError, Result};
use crate::gateway::ObjectStoreClient;
use crate::parquet_out::{read_parquet_file, write_parquet_file, ParquetOptions};

/// Result of reading a stored table.
#[derive(Debug)]
pub enum LoadOutcome {
    Found(RecordBatch),
    NotFound,
    Failed(EtlError),
}

impl LoadOutcome {
    /// Collapse to "present or absent", discarding why a read failed.
    pub fn into_option(self) -> Option<RecordBatch> {
        match self {
            LoadOutcome::Found(batch) => Some(batch),
            LoadOutcome::NotFound | LoadOutcome::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LoadOutcome::Found(_))
    }
}

/// Saves and loads tables as Parquet files for a logical data type, either
/// under a local directory tree or in the configured default bucket.
pub struct StorageManager {
    config: StorageConfig,
    options: ParquetOptions,
    objects: Option<Arc<ObjectStoreClient>>,
}

impl StorageManager {
    /// `objects` is required in s3 mode and ignored in local mode. In local
    /// mode every configured directory is created up front.
    pub fn new(config: StorageConfig, objects: Option<Arc<ObjectStoreClient>>) -> Result<Self> {
        let options = config.parquet.options()?;

        match config.storage_mode {
            StorageMode::Local => {
                for sub in config.local.paths.values() {
                    fs::create_dir_all(config.local.base_path.join(sub))?;
                }
            }
            StorageMode::S3 if objects.is_none() => {
                return Err(EtlError::Config(
                    "s3 storage mode needs an object store client".to_string(),
                ));
            }
            StorageMode::S3 => {}
        }

        info!(mode = %config.storage_mode, "Storage manager ready");
        Ok(Self {
            config,
            options,
            objects,
        })
    }

    /// Build a manager for `config`, reading `AWS_*` object store
    /// credentials from the environment when the mode is s3.
    pub fn connect(config: StorageConfig) -> Result<Self> {
        let objects = match config.storage_mode {
            StorageMode::Local => None,
            StorageMode::S3 => Some(Arc::new(ObjectStoreClient::from_env(
                STORAGE_OBJECT_STORE_PREFIX,
            )?)),
        };
        Self::new(config, objects)
    }

    pub fn mode(&self) -> StorageMode {
        self.config.storage_mode
    }

    pub fn path_for(&self, data_type: &str) -> Result<String> {
        self.config.path_for(data_type)
    }

    fn objects(&self) -> Result<&ObjectStoreClient> {
        self.objects
            .as_deref()
            .ok_or_else(|| EtlError::Config("no object store client configured".to_string()))
    }

    fn remote_key(prefix: &str, filename: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{prefix}/{filename}")
        }
    }

    fn temp_file(&self, filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.local.temp_path)?;
        Ok(self.config.local.temp_path.join(filename))
    }

    /// Write `batch` as `filename` for `data_type`. Returns the local path in
    /// local mode, the object key in s3 mode.
    pub async fn save(&self, batch: &RecordBatch, data_type: &str, filename: &str) -> Result<String> {
        let location = self.path_for(data_type)?;

        match self.config.storage_mode {
            StorageMode::Local => {
                let full_path = Path::new(&location).join(filename);
                write_parquet_file(&full_path, batch, &self.options)?;
                debug!(rows = batch.num_rows(), "Saved {}", full_path.display());
                Ok(full_path.to_string_lossy().to_string())
            }
            StorageMode::S3 => {
                let temp_path = self.temp_file(filename)?;
                write_parquet_file(&temp_path, batch, &self.options)?;

                let key = Self::remote_key(&location, filename);
                let bucket = &self.config.s3.default_bucket;
                self.objects()?.upload(&temp_path, bucket, &key).await?;

                fs::remove_file(&temp_path)?;
                debug!(rows = batch.num_rows(), bucket = %bucket, "Saved {}", key);
                Ok(key)
            }
        }
    }

    /// Read `filename` for `data_type`. Never returns an error directly:
    /// a missing file is `NotFound`, anything else that goes wrong is
    /// `Failed`.
    pub async fn load(&self, data_type: &str, filename: &str) -> LoadOutcome {
        let location = match self.path_for(data_type) {
            Ok(location) => location,
            Err(e) => return LoadOutcome::Failed(e),
        };

        match self.config.storage_mode {
            StorageMode::Local => {
                let full_path = Path::new(&location).join(filename);
                if !full_path.exists() {
                    return LoadOutcome::NotFound;
                }
                match read_parquet_file(&full_path) {
                    Ok(batch) => LoadOutcome::Found(batch),
                    Err(e) => {
                        warn!("Failed to read {}: {}", full_path.display(), e);
                        LoadOutcome::Failed(e)
                    }
                }
            }
            StorageMode::S3 => {
                let key = Self::remote_key(&location, filename);
                match self.load_remote(&key, filename).await {
                    Ok(batch) => LoadOutcome::Found(batch),
                    Err(e) if e.is_not_found() => LoadOutcome::NotFound,
                    Err(e) => {
                        warn!("Failed to load {}: {}", key, e);
                        LoadOutcome::Failed(e)
                    }
                }
            }
        }
    }

    async fn load_remote(&self, key: &str, filename: &str) -> Result<RecordBatch> {
        let temp_path = self.temp_file(filename)?;
        self.objects()?
            .download(&self.config.s3.default_bucket, key, &temp_path)
            .await?;
        let parsed = read_parquet_file(&temp_path);
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!("Could not remove temp file {}: {}", temp_path.display(), e);
        }
        parsed
    }
}
