//! Two-task annotation of clean posts through the text-understanding service.
//!
//! Each post gets two independent calls (summary, intention). A task that
//! fails leaves only its own field empty; a post is released once both of
//! its calls have settled.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use tweetlens_common::{AnnotatedPost, CleanPost, Intention};

use crate::error::AnnotateError;
use crate::traits::TextModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationTask {
    Summary,
    Intention,
}

impl AnnotationTask {
    pub const ALL: [AnnotationTask; 2] = [AnnotationTask::Summary, AnnotationTask::Intention];

    pub fn name(self) -> &'static str {
        match self {
            AnnotationTask::Summary => "summary",
            AnnotationTask::Intention => "intention",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            AnnotationTask::Summary => {
                "Imagina que eres un experto en descubrir palabras clave y resumiendo contenido"
            }
            AnnotationTask::Intention => "Imagina que eres un experto en politica y opinologia",
        }
    }

    pub fn question(self) -> &'static str {
        match self {
            AnnotationTask::Summary => {
                "Me puedes decir cual es el tema central del siguiente tweet? responde en no mas de 3 palabras"
            }
            AnnotationTask::Intention => {
                "Crees que el siguiente tweet tiene una intención constructiva, destructiva o neutral? Tu respuesta debe ser una sola palabra"
            }
        }
    }

    pub fn user_prompt(self, text: &str) -> String {
        format!("{}\nTweet:\n\"\"\"\n{}", self.question(), text)
    }
}

#[derive(Debug, Clone)]
pub struct AnnotatorSettings {
    pub model: String,
    pub temperature: f32,
    /// Bound on each individual call, retries included separately.
    pub timeout: Duration,
    /// Extra attempts after a retryable failure.
    pub retries: u32,
}

impl Default for AnnotatorSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.5,
            timeout: Duration::from_secs(30),
            retries: 1,
        }
    }
}

/// Both task results for one post.
#[derive(Debug)]
pub struct ItemAnnotation {
    pub post: CleanPost,
    pub summary: Result<String, AnnotateError>,
    pub intention: Result<Intention, AnnotateError>,
}

impl ItemAnnotation {
    /// The annotated post, or `None` when neither task produced anything.
    pub fn into_annotated(self) -> Option<AnnotatedPost> {
        let summary = self.summary.ok();
        let intention = self.intention.ok();
        if summary.is_none() && intention.is_none() {
            return None;
        }
        Some(AnnotatedPost::new(self.post, summary, intention))
    }
}

#[derive(Clone)]
pub struct Annotator {
    model: Arc<dyn TextModel>,
    settings: AnnotatorSettings,
}

impl Annotator {
    pub fn new(model: Arc<dyn TextModel>, settings: AnnotatorSettings) -> Self {
        Self { model, settings }
    }

    /// Run one task against `text`, returning the raw reply.
    pub async fn annotate(&self, text: &str, task: AnnotationTask) -> Result<String, AnnotateError> {
        let mut attempt = 0;
        loop {
            match self.call(text, task).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.settings.retries => {
                    attempt += 1;
                    warn!(task = task.name(), attempt, error = %e, "Annotation call failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call(&self, text: &str, task: AnnotationTask) -> Result<String, AnnotateError> {
        let user = task.user_prompt(text);
        let reply = tokio::time::timeout(
            self.settings.timeout,
            self.model.complete(
                task.system_prompt(),
                &user,
                &self.settings.model,
                self.settings.temperature,
            ),
        )
        .await
        .map_err(|_| AnnotateError::Timeout)??;
        Ok(reply)
    }

    /// Intention task, parsed into the closed label set.
    pub async fn classify(&self, text: &str) -> Result<Intention, AnnotateError> {
        let reply = self.annotate(text, AnnotationTask::Intention).await?;
        Intention::parse(&reply).ok_or(AnnotateError::UnknownLabel(reply))
    }

    /// Both tasks for one post, run side by side.
    pub async fn annotate_post(&self, post: CleanPost) -> ItemAnnotation {
        let (summary, intention) = tokio::join!(
            self.annotate(&post.text, AnnotationTask::Summary),
            self.classify(&post.text),
        );

        if let Err(ref e) = summary {
            warn!(author = %post.author, error = %e, "Summary annotation failed");
        }
        if let Err(ref e) = intention {
            warn!(author = %post.author, error = %e, "Intention annotation failed");
        }
        debug!(
            author = %post.author,
            summary_ok = summary.is_ok(),
            intention_ok = intention.is_ok(),
            "Post annotated"
        );

        ItemAnnotation {
            post,
            summary,
            intention,
        }
    }
}
