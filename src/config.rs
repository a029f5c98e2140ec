use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_TEMP_PATH, NEWS_API_TIMEOUT_ENV, NEWS_API_URL_ENV, NEWS_BUCKET_ENV, NEWS_DB_CONN_ENV,
    NEWS_PREFIX_ENV,
};
use crate::error::{EtlError, Result};
use crate::parquet_out::{parse_compression, ParquetOptions};

/// Read a required environment variable; empty counts as unset.
pub fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EtlError::MissingEnv {
            name: name.to_string(),
        }),
    }
}

pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Settings for the news ingest flow, all taken from the environment.
#[derive(Debug, Clone)]
pub struct NewsFlowConfig {
    pub news_api_url: String,
    pub news_api_timeout: Option<Duration>,
    pub bucket: String,
    pub prefix: String,
    pub database_url: String,
}

impl NewsFlowConfig {
    pub fn from_env() -> Result<Self> {
        let news_api_timeout = match optional_env(NEWS_API_TIMEOUT_ENV) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    EtlError::Config(format!("{NEWS_API_TIMEOUT_ENV} must be whole seconds, got '{raw}'"))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            news_api_url: required_env(NEWS_API_URL_ENV)?,
            news_api_timeout,
            bucket: required_env(NEWS_BUCKET_ENV)?,
            prefix: optional_env(NEWS_PREFIX_ENV).unwrap_or_default(),
            database_url: required_env(NEWS_DB_CONN_ENV)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    S3,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Local => f.write_str("local"),
            StorageMode::S3 => f.write_str("s3"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    pub base_path: PathBuf,
    #[serde(default = "default_temp_path")]
    pub temp_path: PathBuf,
    #[serde(default)]
    pub paths: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    pub default_bucket: String,
    #[serde(default)]
    pub paths: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParquetSettings {
    pub compression: String,
    pub row_group_size: usize,
}

impl ParquetSettings {
    pub fn options(&self) -> Result<ParquetOptions> {
        if self.row_group_size == 0 {
            return Err(EtlError::Config(
                "parquet.row_group_size must be greater than zero".to_string(),
            ));
        }
        Ok(ParquetOptions {
            compression: parse_compression(&self.compression)?,
            row_group_size: self.row_group_size,
        })
    }
}

/// The storage document: where each logical data type lives per mode, and
/// how Parquet files are written.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_mode: StorageMode,
    pub local: LocalStorageConfig,
    pub s3: S3StorageConfig,
    pub parquet: ParquetSettings,
}

fn default_temp_path() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_PATH)
}

impl StorageConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read storage config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StorageConfig = toml::from_str(content)?;
        // surface bad codecs at load time rather than at first write
        config.parquet.options()?;
        Ok(config)
    }

    /// Configured location for `data_type` under the active mode: a local
    /// directory in local mode, a key prefix in s3 mode.
    pub fn path_for(&self, data_type: &str) -> Result<String> {
        let unknown = || EtlError::UnknownDataType {
            data_type: data_type.to_string(),
            mode: self.storage_mode.to_string(),
        };
        match self.storage_mode {
            StorageMode::Local => {
                let sub = self.local.paths.get(data_type).ok_or_else(unknown)?;
                Ok(self.local.base_path.join(sub).to_string_lossy().to_string())
            }
            StorageMode::S3 => self.s3.paths.get(data_type).cloned().ok_or_else(unknown),
        }
    }
}
