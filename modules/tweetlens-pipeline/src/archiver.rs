//! Best-effort raw backup of each batch to the object store.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tweetlens_common::{AnnotatedPost, Batch, Intention};

use crate::error::ArchiveError;
use crate::traits::ObjectStore;

pub const DEFAULT_PREFIX: &str = "raw-messages/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One archived row. Timestamps are epoch seconds so the artifact stays portable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedPost {
    pub author: String,
    pub timestamp: f64,
    pub text: String,
    pub gpt_summary: Option<String>,
    pub gpt_intention: Option<String>,
}

impl From<&AnnotatedPost> for ArchivedPost {
    fn from(post: &AnnotatedPost) -> Self {
        Self {
            author: post.author.clone(),
            timestamp: post.timestamp.timestamp_micros() as f64 / 1_000_000.0,
            text: post.text.clone(),
            gpt_summary: post.summary.clone(),
            gpt_intention: post.intention.map(|i| i.as_label().to_string()),
        }
    }
}

impl TryFrom<ArchivedPost> for AnnotatedPost {
    type Error = ArchiveError;

    fn try_from(row: ArchivedPost) -> Result<Self, Self::Error> {
        let micros = (row.timestamp * 1_000_000.0).round();
        let timestamp = DateTime::from_timestamp_micros(micros as i64)
            .filter(|_| micros.is_finite())
            .ok_or(ArchiveError::Timestamp(row.timestamp))?;
        let intention = row
            .gpt_intention
            .map(|label| Intention::parse(&label).ok_or(ArchiveError::Label(label)))
            .transpose()?;

        Ok(AnnotatedPost {
            author: row.author,
            timestamp,
            text: row.text,
            summary: row.gpt_summary,
            intention,
        })
    }
}

/// Artifact file name for a run started at `run_at`, e.g. `02-09-2023-14:25:02.json`.
pub fn archive_name(run_at: DateTime<Utc>) -> String {
    format!("{}.json", run_at.format("%d-%m-%Y-%H:%M:%S"))
}

/// Object key for a run: `prefix` followed by `archive_name`.
pub fn archive_key(prefix: &str, run_at: DateTime<Utc>) -> String {
    format!("{}{}", prefix, archive_name(run_at))
}

pub fn encode_batch(batch: &Batch) -> Result<Vec<u8>, ArchiveError> {
    let rows: Vec<ArchivedPost> = batch.posts().iter().map(ArchivedPost::from).collect();
    Ok(serde_json::to_vec(&rows)?)
}

/// Reverse of `encode_batch`.
pub fn read_archive(bytes: &[u8]) -> Result<Vec<AnnotatedPost>, ArchiveError> {
    let rows: Vec<ArchivedPost> = serde_json::from_slice(bytes)?;
    rows.into_iter().map(AnnotatedPost::try_from).collect()
}

pub struct Archiver {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    timeout: Duration,
}

impl Archiver {
    /// `timeout` bounds each upload; an upload that outlives it counts as failed.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
            timeout,
        }
    }

    pub fn key_for(&self, run_at: DateTime<Utc>) -> String {
        archive_key(&self.prefix, run_at)
    }

    /// Upload the batch. Failures are logged and reported as `false`; they never propagate.
    pub async fn archive(&self, batch: &Batch) -> bool {
        let key = self.key_for(batch.run_at());

        let body = match encode_batch(batch) {
            Ok(body) => body,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to encode archive");
                return false;
            }
        };
        let size = body.len();

        let upload = self.store.put(&self.bucket, &key, Bytes::from(body));
        match tokio::time::timeout(self.timeout, upload).await {
            Ok(Ok(())) => {
                info!(bucket = %self.bucket, key = %key, posts = batch.len(), bytes = size, "Batch archived");
                true
            }
            Ok(Err(e)) => {
                error!(bucket = %self.bucket, key = %key, error = %e, "Archive upload failed");
                false
            }
            Err(_) => {
                error!(bucket = %self.bucket, key = %key, timeout = ?self.timeout, "Archive upload timed out");
                false
            }
        }
    }
}
