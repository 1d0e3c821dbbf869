// Postgres sink for annotated batches, plus the dashboard read path.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use tracing::{error, info, warn};
use tweetlens_common::{AnnotatedPost, Batch, Config, Intention};

use crate::error::RepositoryError;
use crate::traits::BatchSink;

/// Insert column order. Matches the bind order in `insert_rows`.
pub const COLUMNS: [&str; 5] = ["author", "timestamp", "text", "gpt_summary", "gpt_intention"];

/// Postgres caps a statement at 65535 bind parameters.
const MAX_ROWS_PER_STATEMENT: usize = 65_535 / COLUMNS.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed { rows: usize },
    /// The insert failed and the transaction was rolled back. Logged, not raised.
    RolledBack { reason: String },
}

impl WriteOutcome {
    pub fn rows(&self) -> usize {
        match self {
            WriteOutcome::Committed { rows } => *rows,
            WriteOutcome::RolledBack { .. } => 0,
        }
    }
}

pub fn connect_options(config: &Config) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
        .database(&config.db_name)
        .options([(
            "statement_timeout",
            config.db_statement_timeout.as_millis().to_string(),
        )])
}

/// Open one connection, giving up after `timeout`.
pub async fn connect(
    options: &PgConnectOptions,
    timeout: Duration,
) -> Result<PgConnection, RepositoryError> {
    tokio::time::timeout(timeout, PgConnection::connect_with(options))
        .await
        .map_err(|_| RepositoryError::ConnectTimeout(timeout))?
        .map_err(RepositoryError::from)
}

pub async fn migrate(conn: &mut PgConnection) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(conn).await?;
    Ok(())
}

/// Write `batch` into `table` in one transaction, then close `conn`.
///
/// An empty batch or a missing connection is a caller error. Insert failures
/// are rolled back and come back as `WriteOutcome::RolledBack`. Once an insert
/// is attempted the connection is closed on every path. An empty batch never
/// uses it: the connection is released by drop with no message sent.
pub async fn write_batch(
    batch: &Batch,
    conn: Option<PgConnection>,
    table: &str,
) -> Result<WriteOutcome, RepositoryError> {
    if batch.is_empty() {
        return Err(RepositoryError::NoData);
    }
    let mut conn = conn.ok_or(RepositoryError::NoConnection)?;

    let outcome = insert_batch(&mut conn, batch, table).await;
    close(conn).await;
    Ok(outcome)
}

async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close database connection cleanly");
    }
}

async fn insert_batch(conn: &mut PgConnection, batch: &Batch, table: &str) -> WriteOutcome {
    let mut tx = match conn.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!(table, error = %e, "Failed to open transaction");
            return WriteOutcome::RolledBack {
                reason: e.to_string(),
            };
        }
    };

    match insert_rows(&mut tx, batch.posts(), table).await {
        Ok(rows) => match tx.commit().await {
            Ok(()) => {
                info!(table, rows, "Batch committed");
                WriteOutcome::Committed { rows }
            }
            Err(e) => {
                error!(table, error = %e, "Commit failed");
                WriteOutcome::RolledBack {
                    reason: e.to_string(),
                }
            }
        },
        Err(e) => {
            error!(table, posts = batch.len(), error = %e, "Batch insert failed, rolling back");
            if let Err(rb) = tx.rollback().await {
                warn!(table, error = %rb, "Rollback failed");
            }
            WriteOutcome::RolledBack {
                reason: e.to_string(),
            }
        }
    }
}

async fn insert_rows(
    conn: &mut PgConnection,
    posts: &[AnnotatedPost],
    table: &str,
) -> Result<usize, sqlx::Error> {
    let mut rows = 0;
    for chunk in posts.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} ({}) ",
            table,
            COLUMNS.join(", ")
        ));
        qb.push_values(chunk, |mut row, post| {
            row.push_bind(post.author.as_str())
                .push_bind(post.timestamp)
                .push_bind(post.text.as_str())
                .push_bind(post.summary.as_deref())
                .push_bind(post.intention.map(Intention::as_label));
        });
        rows += qb.build().execute(&mut *conn).await?.rows_affected() as usize;
    }
    Ok(rows)
}

/// A stored row as the dashboard reads it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct StoredPost {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub gpt_summary: Option<String>,
    pub gpt_intention: Option<String>,
}

/// Rows from `start` through `end` (whole UTC days, inclusive), newest first,
/// whose intention normalizes to a known label. `gpt_intention` comes back normalized.
pub async fn annotated_between(
    conn: &mut PgConnection,
    table: &str,
    start: NaiveDate,
    end: NaiveDate,
    author: Option<&str>,
) -> Result<Vec<StoredPost>, RepositoryError> {
    let from = start.and_time(NaiveTime::MIN).and_utc();
    let until = end.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::days(1);

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT author, timestamp, text, gpt_summary, \
         replace(lower(gpt_intention), '.', '') AS gpt_intention \
         FROM {} WHERE timestamp >= ",
        table
    ));
    qb.push_bind(from)
        .push(" AND timestamp < ")
        .push_bind(until)
        .push(" AND replace(lower(gpt_intention), '.', '') = ANY(")
        .push_bind(Intention::labels())
        .push(")");
    if let Some(author) = author {
        qb.push(" AND author = ").push_bind(author);
    }
    qb.push(" ORDER BY timestamp DESC");

    let rows = qb.build_query_as::<StoredPost>().fetch_all(conn).await?;
    Ok(rows)
}

/// Production `BatchSink`: one fresh connection per batch.
pub struct PgRepository {
    options: PgConnectOptions,
    connect_timeout: Duration,
    table: String,
}

impl PgRepository {
    pub fn new(options: PgConnectOptions, connect_timeout: Duration, table: impl Into<String>) -> Self {
        Self {
            options,
            connect_timeout,
            table: table.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(connect_options(config), config.db_connect_timeout, &config.table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn connect(&self) -> Result<PgConnection, RepositoryError> {
        connect(&self.options, self.connect_timeout).await
    }
}

#[async_trait]
impl BatchSink for PgRepository {
    async fn persist(&self, batch: &Batch) -> anyhow::Result<WriteOutcome> {
        let conn = self
            .connect()
            .await
            .context("Failed to connect to the database")?;
        Ok(write_batch(batch, Some(conn), &self.table).await?)
    }
}
