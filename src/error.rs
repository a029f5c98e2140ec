use std::fmt;
use thiserror::Error;

use crate::pipeline::FlowStage;

/// Stable classification of an [`EtlError`], independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Upstream,
    Normalize,
    Columnar,
    ObjectStore,
    Relational,
    Metadata,
    Metrics,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Normalize => "normalize",
            ErrorKind::Columnar => "columnar",
            ErrorKind::ObjectStore => "object_store",
            ErrorKind::Relational => "relational",
            ErrorKind::Metadata => "metadata",
            ErrorKind::Metrics => "metrics",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("News endpoint {url} returned {status}: {body}")]
    UpstreamStatus { url: String, status: u16, body: String },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable {name} is not set")]
    MissingEnv { name: String },

    #[error("Unknown data type '{data_type}' for {mode} storage")]
    UnknownDataType { data_type: String, mode: String },

    #[error("Cannot normalize record {index}: {reason}")]
    Normalize { index: usize, reason: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Error uploading to {bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Error downloading from {bucket}/{key}: {source}")]
    Download {
        bucket: String,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("No object store backend for bucket '{bucket}'")]
    NoBackend { bucket: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Error {operation} into {table}: {status} - {body}")]
    MetadataStatus {
        operation: &'static str,
        table: String,
        status: u16,
        body: String,
    },

    #[error("Error {operation} into {table}: {source}")]
    MetadataTransport {
        operation: &'static str,
        table: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Error {operation} into {table}: response is not JSON: {source}")]
    MetadataDecode {
        operation: &'static str,
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Pushgateway {url} returned {status}: {body}")]
    PushStatus { url: String, status: u16, body: String },

    #[error("News ingest failed while {stage}: {source}")]
    Flow {
        stage: FlowStage,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Http(_) | EtlError::UpstreamStatus { .. } => ErrorKind::Upstream,
            EtlError::Json(_) => ErrorKind::Upstream,
            EtlError::Toml(_)
            | EtlError::Config(_)
            | EtlError::MissingEnv { .. }
            | EtlError::UnknownDataType { .. }
            | EtlError::NoBackend { .. } => ErrorKind::Config,
            EtlError::Io(_) => ErrorKind::Io,
            EtlError::Normalize { .. } => ErrorKind::Normalize,
            EtlError::Arrow(_) | EtlError::Parquet(_) => ErrorKind::Columnar,
            EtlError::Upload { .. } | EtlError::Download { .. } => ErrorKind::ObjectStore,
            EtlError::Database(_) => ErrorKind::Relational,
            EtlError::MetadataStatus { .. }
            | EtlError::MetadataTransport { .. }
            | EtlError::MetadataDecode { .. } => ErrorKind::Metadata,
            EtlError::PushStatus { .. } => ErrorKind::Metrics,
            EtlError::Flow { source, .. } => source.kind(),
        }
    }

    /// The object store reported that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            EtlError::Upload { source, .. } | EtlError::Download { source, .. } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            EtlError::Flow { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// A create-only write hit an existing object.
    pub fn is_already_exists(&self) -> bool {
        match self {
            EtlError::Upload { source, .. } => {
                matches!(source, object_store::Error::AlreadyExists { .. })
            }
            EtlError::Flow { source, .. } => source.is_already_exists(),
            _ => false,
        }
    }

    /// Stage of the news ingest flow this error surfaced in, if any.
    pub fn stage(&self) -> Option<FlowStage> {
        match self {
            EtlError::Flow { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
