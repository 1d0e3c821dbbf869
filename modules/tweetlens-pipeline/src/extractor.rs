use tweetlens_common::{CleanPost, RawPost};

use crate::error::ExtractError;
use crate::time_filter::parse_created_at;

/// Normalize a filtered post into the fixed internal shape, taking the
/// sanitized `text` in place of the source text.
pub fn extract(post: &RawPost, text: String) -> Result<CleanPost, ExtractError> {
    let author = post
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or(ExtractError::MissingField("author"))?;

    let created_at = post
        .created_at
        .as_deref()
        .ok_or(ExtractError::MissingField("created_at"))?;

    Ok(CleanPost {
        author: author.to_string(),
        timestamp: parse_created_at(created_at)?,
        text,
    })
}
