//! One ingest run: fetch, filter, sanitize, extract, annotate, then archive
//! and persist side by side.
//!
//! `Pipeline::run` is the host-facing entry point. It never returns an error
//! and never panics: every failure ends up in the returned `RunOutcome` and
//! in the log.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use futures::{stream, FutureExt, StreamExt};
use tracing::{error, info, info_span, warn, Instrument};
use tweetlens_common::{AnnotatedPost, Batch, CleanPost, Config, RawPost};
use uuid::Uuid;

use crate::annotator::{Annotator, ItemAnnotation};
use crate::archiver::Archiver;
use crate::extractor::extract;
use crate::repository::WriteOutcome;
use crate::sanitizer::{sanitize, DropReason, Verdict};
use crate::stats::RunStats;
use crate::time_filter::is_recent_at;
use crate::traits::{BatchSink, FeedSource};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub handles: Vec<String>,
    pub feed_limit: u32,
    pub max_age_minutes: i64,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,
    pub annotation_concurrency: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            handles: config.tracked_handles.clone(),
            feed_limit: config.feed_limit,
            max_age_minutes: config.max_age_minutes,
            fetch_timeout: config.feed_timeout,
            fetch_concurrency: config.fetch_concurrency,
            annotation_concurrency: config.annotation_concurrency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Filter,
    Extract,
    Annotate,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Filter => "filter",
            Stage::Extract => "extract",
            Stage::Annotate => "annotate",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunStats),
    /// A stage failed past its own recovery. Counters up to that point are kept.
    Failed {
        stage: Stage,
        error: String,
        stats: RunStats,
    },
    /// Something panicked; the panic was contained.
    Panicked { message: String },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn stats(&self) -> Option<&RunStats> {
        match self {
            RunOutcome::Completed(stats) | RunOutcome::Failed { stats, .. } => Some(stats),
            RunOutcome::Panicked { .. } => None,
        }
    }
}

struct StageFailure {
    stage: Stage,
    error: anyhow::Error,
    stats: RunStats,
}

pub struct Pipeline {
    feed: Arc<dyn FeedSource>,
    annotator: Annotator,
    archiver: Archiver,
    sink: Arc<dyn BatchSink>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        annotator: Annotator,
        archiver: Archiver,
        sink: Arc<dyn BatchSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            feed,
            annotator,
            archiver,
            sink,
            settings,
        }
    }

    pub async fn run(&self) -> RunOutcome {
        self.run_at(Utc::now()).await
    }

    /// One run against a fixed clock. Contains every error and panic.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);

        let result = AssertUnwindSafe(self.run_stages(now).instrument(span.clone()))
            .catch_unwind()
            .await;

        span.in_scope(|| match result {
            Ok(Ok(stats)) => {
                info!("{stats}");
                RunOutcome::Completed(stats)
            }
            Ok(Err(failure)) => {
                error!(stage = %failure.stage, error = %failure.error, "Run failed");
                info!("{}", failure.stats);
                RunOutcome::Failed {
                    stage: failure.stage,
                    error: format!("{:#}", failure.error),
                    stats: failure.stats,
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Run panicked");
                RunOutcome::Panicked { message }
            }
        })
    }

    async fn run_stages(&self, now: DateTime<Utc>) -> Result<RunStats, StageFailure> {
        let mut stats = RunStats::default();

        let raw = self.fetch_all(&mut stats).await;
        info!(fetched = raw.len(), "Fetch complete");

        let clean: Vec<CleanPost> = raw
            .into_iter()
            .filter_map(|post| self.prepare(post, now, &mut stats))
            .collect();
        info!(clean = clean.len(), "Filtering complete");

        let annotated = self.annotate_all(clean, &mut stats).await;
        let batch = Batch::new(now, annotated);

        let (archived, persisted) = tokio::join!(self.archiver.archive(&batch), self.persist(&batch));
        stats.archived = archived;

        match persisted {
            Ok(outcome) => {
                stats.persisted = outcome.rows() as u32;
                Ok(stats)
            }
            Err(error) => Err(StageFailure {
                stage: Stage::Persist,
                error,
                stats,
            }),
        }
    }

    async fn fetch_all(&self, stats: &mut RunStats) -> Vec<RawPost> {
        let limit = self.settings.feed_limit;
        let timeout = self.settings.fetch_timeout;

        let results: Vec<(String, anyhow::Result<Vec<RawPost>>)> =
            stream::iter(self.settings.handles.iter().cloned())
                .map(|handle| async move {
                    let fetched = tokio::time::timeout(timeout, self.feed.fetch_recent(&handle, limit))
                        .await
                        .unwrap_or_else(|_| Err(anyhow!("timed out after {timeout:?}")));
                    (handle, fetched)
                })
                .buffered(self.settings.fetch_concurrency.max(1))
                .collect()
                .await;

        let mut posts = Vec::new();
        for (handle, fetched) in results {
            stats.sources_requested += 1;
            match fetched {
                Ok(batch) => posts.extend(batch),
                Err(e) => {
                    stats.sources_failed += 1;
                    warn!(stage = %Stage::Fetch, handle = %handle, error = %e, "Source skipped");
                }
            }
        }
        stats.fetched = posts.len() as u32;
        posts
    }

    /// Time filter, sanitizer and extractor for one item. `None` means dropped.
    fn prepare(&self, post: RawPost, now: DateTime<Utc>, stats: &mut RunStats) -> Option<CleanPost> {
        match is_recent_at(&post, self.settings.max_age_minutes, now) {
            Ok(true) => {}
            Ok(false) => {
                stats.stale += 1;
                return None;
            }
            Err(e) => {
                stats.extraction_failures += 1;
                warn!(stage = %Stage::Filter, author = ?post.author, error = %e, "Item skipped");
                return None;
            }
        }

        let text = match sanitize(&post) {
            Verdict::Keep(text) => text,
            Verdict::Drop(DropReason::Repost) => {
                stats.reposts += 1;
                return None;
            }
            Verdict::Drop(DropReason::NoLink) => {
                stats.link_free += 1;
                return None;
            }
        };

        match extract(&post, text) {
            Ok(clean) => Some(clean),
            Err(e) => {
                stats.extraction_failures += 1;
                warn!(stage = %Stage::Extract, author = ?post.author, error = %e, "Item skipped");
                None
            }
        }
    }

    async fn annotate_all(&self, posts: Vec<CleanPost>, stats: &mut RunStats) -> Vec<AnnotatedPost> {
        let items: Vec<ItemAnnotation> = stream::iter(posts)
            .map(|post| self.annotator.annotate_post(post))
            .buffered(self.settings.annotation_concurrency.max(1))
            .collect()
            .await;

        let mut annotated = Vec::with_capacity(items.len());
        for item in items {
            if item.summary.is_err() {
                stats.summary_failures += 1;
            }
            if item.intention.is_err() {
                stats.intention_failures += 1;
            }
            let author = item.post.author.clone();
            match item.into_annotated() {
                Some(post) => annotated.push(post),
                None => {
                    stats.unannotated += 1;
                    warn!(stage = %Stage::Annotate, author = %author, "Both annotations failed, item dropped");
                }
            }
        }
        stats.annotated = annotated.len() as u32;
        annotated
    }

    async fn persist(&self, batch: &Batch) -> anyhow::Result<WriteOutcome> {
        if batch.is_empty() {
            info!(stage = %Stage::Persist, "No data to persist");
            return Ok(WriteOutcome::Committed { rows: 0 });
        }
        let outcome = self.sink.persist(batch).await?;
        if let WriteOutcome::RolledBack { reason } = &outcome {
            warn!(stage = %Stage::Persist, reason = %reason, "Batch rolled back");
        }
        Ok(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_render() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(boxed.as_ref()), "kaboom");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Persist.to_string(), "persist");
        assert_eq!(Stage::Fetch.to_string(), "fetch");
    }
}
