use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::Storage;
use tracing::info;

use crate::traits::ObjectStore;

/// Google Cloud Storage. Credentials come from the ambient
/// `GOOGLE_APPLICATION_CREDENTIALS` service-account file.
pub struct GcsStore {
    client: Storage,
}

impl GcsStore {
    pub async fn connect() -> Result<Self> {
        let client = Storage::builder()
            .build()
            .await
            .context("Failed to create GCS client")?;
        info!("GCS client ready");
        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let bucket_path = format!("projects/_/buckets/{}", bucket);
        self.client
            .write_object(&bucket_path, key, body)
            .send_buffered()
            .await
            .with_context(|| format!("GCS upload to {bucket}/{key} failed"))?;
        Ok(())
    }
}

/// Directory-backed store for local runs. Objects land at `root/bucket/key`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let path = self.path_for(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
