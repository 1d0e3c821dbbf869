//! Keep/drop policy for fetched posts.
//!
//! Reposts are always dropped. Of the remaining posts only those whose text
//! carries a link are kept, with every link token stripped out. Link-free
//! originals are dropped: this pipeline treats link-bearing originals as the
//! only signal-bearing posts.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;
use tweetlens_common::RawPost;

/// Scheme prefix that marks a whitespace-delimited token as a link.
const LINK_PREFIX: &str = "http";

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Repost,
    NoLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Keep, with link-stripped text.
    Keep(String),
    Drop(DropReason),
}

pub fn sanitize(post: &RawPost) -> Verdict {
    if post.is_repost {
        return Verdict::Drop(DropReason::Repost);
    }

    let text = post.text.as_deref().unwrap_or_default();
    if !contains_link(text) {
        if post.has_links {
            trace!(author = ?post.author, "link entities present but no link token in text");
        }
        return Verdict::Drop(DropReason::NoLink);
    }

    Verdict::Keep(strip_links(text))
}

fn is_link(token: &str) -> bool {
    token.starts_with(LINK_PREFIX)
}

pub fn contains_link(text: &str) -> bool {
    TOKEN_RE.find_iter(text).any(|m| is_link(m.as_str()))
}

/// Remove every link token, leaving all other characters (whitespace included) in place.
pub fn strip_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in TOKEN_RE.find_iter(text) {
        if is_link(m.as_str()) {
            out.push_str(&text[last..m.start()]);
            last = m.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(text: &str, is_repost: bool) -> RawPost {
        RawPost {
            author: Some("izkia".into()),
            created_at: Some("Sat Sep 02 14:25:02 +0000 2023".into()),
            text: Some(text.into()),
            is_repost,
            has_links: false,
        }
    }

    #[test]
    fn reposts_are_dropped_regardless_of_links() {
        assert_eq!(
            sanitize(&post("RT @x: mira https://t.co/a", true)),
            Verdict::Drop(DropReason::Repost)
        );
        assert_eq!(
            sanitize(&post("sin enlace", true)),
            Verdict::Drop(DropReason::Repost)
        );
    }

    #[test]
    fn link_free_originals_are_dropped() {
        assert_eq!(
            sanitize(&post("Hoy es un gran día para Chile", false)),
            Verdict::Drop(DropReason::NoLink)
        );
        let mut no_text = post("", false);
        no_text.text = None;
        assert_eq!(sanitize(&no_text), Verdict::Drop(DropReason::NoLink));
    }

    #[test]
    fn links_are_stripped_and_surroundings_kept() {
        assert_eq!(
            sanitize(&post("Lean esto http://x por favor", false)),
            Verdict::Keep("Lean esto  por favor".into())
        );
    }

    #[test]
    fn every_link_token_is_removed() {
        assert_eq!(
            strip_links("a https://t.co/1\nb https://t.co/2"),
            "a \nb "
        );
        assert_eq!(strip_links("https://t.co/solo"), "");
    }

    #[test]
    fn only_tokens_starting_with_scheme_count() {
        assert!(!contains_link("see(https://t.co/x)"));
        assert!(contains_link("see https://t.co/x)"));
        assert_eq!(strip_links("see (https://t.co/x)"), "see (https://t.co/x)");
    }
}
