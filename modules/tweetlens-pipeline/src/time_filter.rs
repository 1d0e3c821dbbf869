use chrono::{DateTime, Duration, Utc};
use tweetlens_common::RawPost;

use crate::error::ExtractError;

/// Twitter's native format, e.g. `Sat Sep 02 14:25:02 +0000 2021`.
const TWITTER_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

pub const DEFAULT_MAX_AGE_MINUTES: i64 = 20;

/// Parse a source-native creation timestamp into a UTC instant.
/// Accepts Twitter's format and RFC 3339.
pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>, ExtractError> {
    let value = value.trim();
    DateTime::parse_from_str(value, TWITTER_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ExtractError::Timestamp {
            value: value.to_string(),
        })
}

/// Elapsed time since `created`. Clock skew that puts `created` in the future yields zero.
pub fn age(created: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - created).max(Duration::zero())
}

/// Whether the post was created at most `max_age_minutes` before `now` (inclusive).
pub fn is_recent_at(
    post: &RawPost,
    max_age_minutes: i64,
    now: DateTime<Utc>,
) -> Result<bool, ExtractError> {
    let raw = post
        .created_at
        .as_deref()
        .ok_or(ExtractError::MissingField("created_at"))?;
    let created = parse_created_at(raw)?;
    Ok(age(created, now) <= Duration::minutes(max_age_minutes))
}

/// `is_recent_at` against the current UTC instant.
pub fn is_recent(post: &RawPost, max_age_minutes: i64) -> Result<bool, ExtractError> {
    is_recent_at(post, max_age_minutes, Utc::now())
}
