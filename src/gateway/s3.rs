use bytes::Bytes;
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::{optional_env, required_env};
use crate::error::{EtlError, Result};

/// Credentials for an S3-compatible store, read from `<PREFIX>_ACCESS_KEY`,
/// `<PREFIX>_SECRET_KEY` and the optional `<PREFIX>_ENDPOINT` / `<PREFIX>_REGION`.
#[derive(Clone)]
pub struct S3Credentials {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl S3Credentials {
    pub fn from_env(prefix: &str) -> Result<Self> {
        Ok(Self {
            endpoint: optional_env(&format!("{prefix}_ENDPOINT")),
            region: optional_env(&format!("{prefix}_REGION")),
            access_key_id: required_env(&format!("{prefix}_ACCESS_KEY"))?,
            secret_access_key: required_env(&format!("{prefix}_SECRET_KEY"))?,
        })
    }

    fn build_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_access_key_id(&self.access_key_id)
            .with_secret_access_key(&self.secret_access_key)
            .with_conditional_put(S3ConditionalPut::ETagMatch);

        // R2 and other S3-compatible endpoints accept "auto"
        let region = self.region.as_deref().unwrap_or(match self.endpoint {
            Some(_) => "auto",
            None => "us-east-1",
        });
        builder = builder.with_region(region);

        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
            if endpoint.starts_with("http://") {
                builder = builder.with_allow_http(true);
            }
        }

        let store = builder.build().map_err(|e| {
            EtlError::Config(format!("Failed to build object store for bucket '{bucket}': {e}"))
        })?;
        Ok(Arc::new(store))
    }
}

/// Copies single objects between the local filesystem (or memory) and
/// buckets.
///
/// Backends are built per bucket on first use from the credentials given at
/// construction and reused afterwards. A ready-made backend can be registered
/// for a bucket with [`ObjectStoreClient::with_backend`].
#[derive(Default)]
pub struct ObjectStoreClient {
    credentials: Option<S3Credentials>,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreClient {
    pub fn new(credentials: S3Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_env(prefix: &str) -> Result<Self> {
        let credentials = S3Credentials::from_env(prefix)?;
        info!(
            endpoint = credentials.endpoint.as_deref().unwrap_or("aws"),
            "Object store credentials loaded for {}", prefix
        );
        Ok(Self::new(credentials))
    }

    pub fn with_backend(self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.stores
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(bucket.into(), store);
        self
    }

    fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }
        let credentials = self.credentials.as_ref().ok_or_else(|| EtlError::NoBackend {
            bucket: bucket.to_string(),
        })?;
        let store = credentials.build_store(bucket)?;
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Upload the file at `local_path` to `bucket/key`, replacing any object
    /// already there.
    pub async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len();
        let store = self.store_for(bucket)?;
        store
            .put(&ObjectPath::from(key), PutPayload::from(bytes))
            .await
            .map_err(|source| EtlError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;
        debug!(bucket, key, size, "Uploaded {}", local_path.display());
        Ok(())
    }

    /// Download `bucket/key` into `local_path`, creating parent directories.
    pub async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let bytes = self.get(bucket, key).await?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &bytes).await?;
        debug!(bucket, key, size = bytes.len(), "Downloaded to {}", local_path.display());
        Ok(())
    }

    /// Store `bytes` at `bucket/key` only if no object exists there yet.
    /// An existing key fails with an error where `is_already_exists()` holds.
    pub async fn put_new(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<()> {
        let store = self.store_for(bucket)?;
        let size = bytes.len();
        let options = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        store
            .put_opts(&ObjectPath::from(key), PutPayload::from(bytes), options)
            .await
            .map_err(|source| EtlError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;
        debug!(bucket, key, size, "Created object");
        Ok(())
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.store_for(bucket)?;
        let wrap = |source| EtlError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        };
        let result = store.get(&ObjectPath::from(key)).await.map_err(wrap)?;
        result.bytes().await.map_err(wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use object_store::memory::InMemory;
    use tempfile::tempdir;

    fn client() -> ObjectStoreClient {
        ObjectStoreClient::default().with_backend("bucket", Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn upload_then_download_copies_the_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"hello").unwrap();

        let client = client();
        client.upload(&src, "bucket", "a/b/c.bin").await.unwrap();

        let dst = dir.path().join("nested").join("dst.bin");
        client.download("bucket", "a/b/c.bin", &dst).await.unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn put_new_refuses_to_overwrite() {
        let client = client();
        client
            .put_new("bucket", "k.parquet", Bytes::from_static(b"one"))
            .await
            .unwrap();
        let err = client
            .put_new("bucket", "k.parquet", Bytes::from_static(b"two"))
            .await
            .unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(err.kind(), ErrorKind::ObjectStore);
        assert_eq!(
            client.get("bucket", "k.parquet").await.unwrap(),
            Bytes::from_static(b"one")
        );
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let err = client()
            .download("bucket", "nope", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("bucket/nope"));
    }

    #[tokio::test]
    async fn unknown_bucket_without_credentials_is_a_config_error() {
        let err = client().get("other", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
