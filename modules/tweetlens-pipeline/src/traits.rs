// Trait seams for the pipeline's external collaborators.
//
// - FeedSource: timeline per tracked handle (Apify)
// - TextModel: the annotation model (OpenAI)
// - ObjectStore: blob store for archive artifacts (GCS or a local dir)
// - BatchSink: relational sink for annotated batches (Postgres)
//
// The mocks in `testing` implement all four so the whole run can be exercised
// with no network and no database.

use ai_client::{AiError, OpenAi};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tweetlens_common::{Batch, RawPost};

use crate::repository::WriteOutcome;

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Most recent posts for one handle, newest first.
    async fn fetch_recent(&self, handle: &str, limit: u32) -> Result<Vec<RawPost>>;
}

#[async_trait]
pub trait TextModel: Send + Sync {
    /// One system + user exchange; returns the single textual reply.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        model: &str,
        temperature: f32,
    ) -> std::result::Result<String, AiError>;
}

#[async_trait]
impl TextModel for OpenAi {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        model: &str,
        temperature: f32,
    ) -> std::result::Result<String, AiError> {
        self.chat_completion(model, system, user, Some(temperature))
            .await
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;
}

#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Persist a non-empty batch. Insert failures come back as
    /// `WriteOutcome::RolledBack`; `Err` means the sink was unusable.
    async fn persist(&self, batch: &Batch) -> Result<WriteOutcome>;
}

