// Test mocks for the tweetlens pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockFeed (FeedSource): handle to canned posts, or an error per handle
// - ScriptedModel (TextModel): fixed reply per annotation task
// - MemoryStore (ObjectStore): in-memory objects, optional failure
// - RecordingSink (BatchSink): records batches, optional rollback or outage
//
// Plus `raw_post` for building source records relative to now.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::AiError;
use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tweetlens_common::{Batch, RawPost};

use crate::annotator::AnnotationTask;
use crate::repository::WriteOutcome;
use crate::traits::{BatchSink, FeedSource, ObjectStore, TextModel};

/// A source record created `minutes_ago` minutes before now, in the feed's native format.
pub fn raw_post(author: &str, minutes_ago: i64, text: &str, is_repost: bool) -> RawPost {
    let created = Utc::now() - chrono::Duration::minutes(minutes_ago);
    RawPost {
        author: Some(author.to_string()),
        created_at: Some(created.format("%a %b %d %H:%M:%S %z %Y").to_string()),
        text: Some(text.to_string()),
        is_repost,
        has_links: text.contains("http"),
    }
}

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

/// Handle-keyed feed. Unregistered handles return an empty timeline.
#[derive(Default)]
pub struct MockFeed {
    posts: HashMap<String, Vec<RawPost>>,
    failing: HashMap<String, String>,
    delay: Option<Duration>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_handle(mut self, handle: &str, posts: Vec<RawPost>) -> Self {
        self.posts.insert(handle.to_string(), posts);
        self
    }

    pub fn failing_handle(mut self, handle: &str, message: &str) -> Self {
        self.failing.insert(handle.to_string(), message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn fetch_recent(&self, handle: &str, limit: u32) -> Result<Vec<RawPost>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failing.get(handle) {
            bail!("MockFeed: {message}");
        }
        Ok(self
            .posts
            .get(handle)
            .map(|posts| posts.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Replies with a fixed string per task, recognised by its system prompt.
/// Clones share the call counter and the pending-failure budget.
#[derive(Clone)]
pub struct ScriptedModel {
    summary: String,
    intention: String,
    failing_task: Option<(AnnotationTask, fn() -> AiError)>,
    fail_remaining: Arc<AtomicU32>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new(summary: &str, intention: &str) -> Self {
        Self {
            summary: summary.to_string(),
            intention: intention.to_string(),
            failing_task: None,
            fail_remaining: Arc::new(AtomicU32::new(0)),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every call for `task` fails with the error `make` builds.
    pub fn fail_task(mut self, task: AnnotationTask, make: fn() -> AiError) -> Self {
        self.failing_task = Some((task, make));
        self
    }

    /// The first `n` calls, across both tasks, fail with a retryable 503.
    pub fn fail_first(self, n: u32) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn task_for(system: &str) -> Option<AnnotationTask> {
        AnnotationTask::ALL
            .into_iter()
            .find(|task| task.system_prompt() == system)
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn complete(
        &self,
        system: &str,
        _user: &str,
        _model: &str,
        _temperature: f32,
    ) -> std::result::Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let claimed = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if claimed {
            return Err(AiError::Api {
                status: 503,
                message: "ScriptedModel: overloaded".into(),
            });
        }

        let task = Self::task_for(system)
            .ok_or_else(|| AiError::Config(format!("ScriptedModel: unknown system prompt {system:?}")))?;
        if let Some((failing, make)) = self.failing_task {
            if failing == task {
                return Err(make());
            }
        }

        Ok(match task {
            AnnotationTask::Summary => self.summary.clone(),
            AnnotationTask::Intention => self.intention.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory object store. Clones share contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<Vec<(String, String, Bytes)>>>,
    fail: bool,
    delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every upload fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every upload sleeps for `delay` before storing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stored `(bucket, key, body)` triples, in upload order.
    pub fn objects(&self) -> Vec<(String, String, Bytes)> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            bail!("MemoryStore: upload refused for {bucket}/{key}");
        }
        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), body));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    #[default]
    Commit,
    /// Insert fails; the batch is rolled back.
    Rollback,
    /// No usable connection.
    Unavailable,
}

/// Records committed batches. Clones share contents.
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<Batch>>>,
    attempts: Arc<AtomicUsize>,
    mode: SinkMode,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: SinkMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Batches that were committed.
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    /// Every `persist` call, committed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn persist(&self, batch: &Batch) -> Result<WriteOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            SinkMode::Commit => {
                self.batches.lock().unwrap().push(batch.clone());
                Ok(WriteOutcome::Committed { rows: batch.len() })
            }
            SinkMode::Rollback => Ok(WriteOutcome::RolledBack {
                reason: "RecordingSink: insert failed".into(),
            }),
            SinkMode::Unavailable => bail!("RecordingSink: no connection"),
        }
    }
}
