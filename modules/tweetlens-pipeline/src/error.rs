use ai_client::AiError;
use thiserror::Error;

/// A single item could not be turned into a `CleanPost`. Never fatal to the batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unparsable timestamp {value:?}")]
    Timestamp { value: String },
}

/// One annotation task failed for one item. Never fatal to the item or batch.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("text service error: {0}")]
    Model(#[from] AiError),

    #[error("text service call timed out")]
    Timeout,

    #[error("reply is not an intention label: {0:?}")]
    UnknownLabel(String),
}

impl AnnotateError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AnnotateError::Model(e) => e.is_retryable(),
            AnnotateError::Timeout => true,
            AnnotateError::UnknownLabel(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archived timestamp out of range: {0}")]
    Timestamp(f64),

    #[error("archived intention is not a label: {0:?}")]
    Label(String),
}

/// Repository failures that reach the caller. Insert failures are rolled
/// back and reported as `WriteOutcome::RolledBack` instead.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("no data: refusing to write an empty batch")]
    NoData,

    #[error("no connection: a live database connection is required")]
    NoConnection,

    #[error("database connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
