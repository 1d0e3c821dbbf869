use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;

/// Upper bound for `MAX_AGE_MINUTES`: one week.
const MAX_AGE_LIMIT_MINUTES: i64 = 7 * 24 * 60;

/// Accounts whose timelines are collected on every run, unless `TRACKED_HANDLES` overrides.
pub const TRACKED_HANDLES: [&str; 17] = [
    "LavinJoaquin",
    "gabrielboric",
    "rodolfocarter",
    "joseantoniokast",
    "AXELKAISER",
    "PamJiles",
    "Orrego",
    "carreragonzalo",
    "Diego_Schalper",
    "GiorgioJackson",
    "izkia",
    "Carolina_Toha",
    "guidogirardi",
    "Jou_Kaiser",
    "MaiteOrsini",
    "GmoRamirez",
    "gonzalowinter",
];

/// Where archive artifacts are uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveBackend {
    /// Google Cloud Storage; the client reads the credentials file itself.
    Gcs { credentials_path: PathBuf },
    /// A local directory standing in for the bucket (development).
    Local { root: PathBuf },
}

/// Application configuration loaded once from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_connect_timeout: Duration,
    pub db_statement_timeout: Duration,
    pub table: String,

    // Text-understanding service
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub llm_timeout: Duration,
    pub annotation_concurrency: usize,

    // Social feed
    pub apify_api_token: String,
    pub feed_timeout: Duration,
    pub feed_limit: u32,
    pub fetch_concurrency: usize,
    pub tracked_handles: Vec<String>,
    pub max_age_minutes: i64,

    // Archive
    pub archive_bucket: String,
    pub archive_prefix: String,
    pub archive_timeout: Duration,
    pub archive_backend: ArchiveBackend,
}

impl Config {
    /// Load configuration from the process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let archive_backend = match env.optional("LOCAL_ARCHIVE_PATH") {
            Some(root) => ArchiveBackend::Local { root: root.into() },
            None => ArchiveBackend::Gcs {
                credentials_path: env.required("GOOGLE_APPLICATION_CREDENTIALS")?.into(),
            },
        };

        let tracked_handles = match env.optional("TRACKED_HANDLES") {
            Some(list) => parse_handles(&list),
            None => TRACKED_HANDLES.iter().map(|h| h.to_string()).collect(),
        };
        if tracked_handles.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }

        let table = env.or("TWEETS_TABLE", "tweets_analytics");
        if !is_valid_identifier(&table) {
            return Err(ConfigError::InvalidTable(table));
        }

        let max_age_minutes: i64 = env.parsed("MAX_AGE_MINUTES", 20)?;
        if !(0..=MAX_AGE_LIMIT_MINUTES).contains(&max_age_minutes) {
            return Err(ConfigError::Invalid {
                name: "MAX_AGE_MINUTES",
                value: max_age_minutes.to_string(),
            });
        }

        let annotation_concurrency: usize = env.parsed("ANNOTATION_CONCURRENCY", 4)?;
        let fetch_concurrency: usize = env.parsed("FETCH_CONCURRENCY", 4)?;

        Ok(Self {
            db_host: env.required("DB_HOST")?,
            db_port: env.parsed("DB_PORT", 5432)?,
            db_user: env.or("DB_USER", "postgres"),
            db_password: env.required("DB_PASSWORD")?,
            db_name: env.or("DB_NAME", "postgres"),
            db_connect_timeout: Duration::from_secs(env.parsed("DB_CONNECT_TIMEOUT_SECS", 1)?),
            db_statement_timeout: Duration::from_secs(env.parsed("DB_STATEMENT_TIMEOUT_SECS", 10)?),
            table,
            openai_api_key: env.required("OPENAI_API_KEY")?,
            openai_model: env.or("OPENAI_MODEL", "gpt-3.5-turbo"),
            openai_temperature: env.parsed("OPENAI_TEMPERATURE", 0.5)?,
            llm_timeout: Duration::from_secs(env.parsed("LLM_TIMEOUT_SECS", 30)?),
            annotation_concurrency: annotation_concurrency.max(1),
            apify_api_token: env.required("APIFY_API_TOKEN")?,
            feed_timeout: Duration::from_secs(env.parsed("FEED_TIMEOUT_SECS", 180)?),
            feed_limit: env.parsed("FEED_LIMIT", 20)?,
            fetch_concurrency: fetch_concurrency.max(1),
            tracked_handles,
            max_age_minutes,
            archive_bucket: env.required("ARCHIVE_BUCKET")?,
            archive_prefix: env.or("ARCHIVE_PREFIX", "raw-messages/"),
            archive_timeout: Duration::from_secs(env.parsed("ARCHIVE_TIMEOUT_SECS", 60)?),
            archive_backend,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        let backend = match &self.archive_backend {
            ArchiveBackend::Gcs { .. } => "gcs",
            ArchiveBackend::Local { .. } => "local",
        };
        info!(
            db_host = %self.db_host,
            db_port = self.db_port,
            db_user = %self.db_user,
            db_password = redact(&self.db_password),
            db_name = %self.db_name,
            table = %self.table,
            openai_api_key = redact(&self.openai_api_key),
            openai_model = %self.openai_model,
            openai_temperature = self.openai_temperature,
            llm_timeout_secs = self.llm_timeout.as_secs(),
            apify_api_token = redact(&self.apify_api_token),
            feed_limit = self.feed_limit,
            tracked_handles = self.tracked_handles.len(),
            max_age_minutes = self.max_age_minutes,
            archive_bucket = %self.archive_bucket,
            archive_prefix = %self.archive_prefix,
            archive_timeout_secs = self.archive_timeout.as_secs(),
            archive_backend = backend,
            "Configuration loaded"
        );
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name: key, value }),
        }
    }
}

fn parse_handles(list: &str) -> Vec<String> {
    list.split(',')
        .map(|h| h.trim().trim_start_matches('@'))
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

/// Table names are spliced into SQL, so only plain (optionally schema-qualified)
/// identifiers are allowed.
fn is_valid_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "***"
    }
}
