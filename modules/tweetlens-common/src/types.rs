use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Source records ---

/// A post as the feed collaborator delivers it. Externally owned; never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPost {
    pub author: Option<String>,
    /// Source-native timestamp string, e.g. `Sat Sep 02 14:25:02 +0000 2021`.
    pub created_at: Option<String>,
    pub text: Option<String>,
    pub is_repost: bool,
    /// Structural link marker from the source (URL entities present).
    pub has_links: bool,
}

/// A post that passed filtering, normalized to the fixed internal shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPost {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Link-stripped text.
    pub text: String,
}

// --- Intention labels ---

/// Closed label set for the intention annotation.
///
/// Stored and displayed with the working-language words the dashboard filters
/// on (`constructiva`, `neutral`, `destructiva`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Intention {
    Constructive,
    Neutral,
    Destructive,
}

impl Intention {
    pub const ALL: [Intention; 3] = [
        Intention::Constructive,
        Intention::Neutral,
        Intention::Destructive,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            Intention::Constructive => "constructiva",
            Intention::Neutral => "neutral",
            Intention::Destructive => "destructiva",
        }
    }

    /// All stored labels, for allow-list filters.
    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(|i| i.as_label().to_string()).collect()
    }

    /// Parse a free-text model reply or stored label. Normalizes first; accepts
    /// both the stored words and their English equivalents.
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "constructiva" | "constructivo" | "constructive" => Some(Intention::Constructive),
            "neutral" | "neutra" | "neutro" => Some(Intention::Neutral),
            "destructiva" | "destructivo" | "destructive" => Some(Intention::Destructive),
            _ => None,
        }
    }
}

impl fmt::Display for Intention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for Intention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intention::parse(s).ok_or_else(|| format!("unknown intention label: {s:?}"))
    }
}

impl From<Intention> for &'static str {
    fn from(i: Intention) -> Self {
        i.as_label()
    }
}

impl TryFrom<String> for Intention {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Trim, lowercase, and drop trailing periods. Idempotent.
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .trim_end_matches('.')
        .trim_end()
        .to_string()
}

// --- Annotated output ---

/// A clean post plus its two annotations. A task that failed leaves its field absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedPost {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub summary: Option<String>,
    pub intention: Option<Intention>,
}

impl AnnotatedPost {
    pub fn new(post: CleanPost, summary: Option<String>, intention: Option<Intention>) -> Self {
        Self {
            author: post.author,
            timestamp: post.timestamp,
            text: post.text,
            summary,
            intention,
        }
    }
}

/// Ordered annotated posts from one pipeline run.
#[derive(Debug, Clone)]
pub struct Batch {
    run_at: DateTime<Utc>,
    posts: Vec<AnnotatedPost>,
}

impl Batch {
    pub fn new(run_at: DateTime<Utc>, posts: Vec<AnnotatedPost>) -> Self {
        Self { run_at, posts }
    }

    pub fn run_at(&self) -> DateTime<Utc> {
        self.run_at
    }

    pub fn posts(&self) -> &[AnnotatedPost] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_replies_normalize_to_labels() {
        assert_eq!(Intention::parse("Constructiva."), Some(Intention::Constructive));
        assert_eq!(Intention::parse("  NEUTRAL\n"), Some(Intention::Neutral));
        assert_eq!(Intention::parse("destructive"), Some(Intention::Destructive));
        assert_eq!(Intention::parse("Destructiva..."), Some(Intention::Destructive));
    }

    #[test]
    fn free_text_is_not_a_label() {
        assert_eq!(Intention::parse("Creo que es constructiva"), None);
        assert_eq!(Intention::parse(""), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["Constructiva.", " Neutral ", "DESTRUCTIVA..", "neutral"] {
            let once = normalize_label(raw);
            assert_eq!(normalize_label(&once), once);
        }
        for intention in Intention::ALL {
            assert_eq!(normalize_label(intention.as_label()), intention.as_label());
        }
    }

    #[test]
    fn intention_serializes_as_stored_label() {
        let json = serde_json::to_string(&Intention::Destructive).unwrap();
        assert_eq!(json, "\"destructiva\"");
        let back: Intention = serde_json::from_str("\"Neutral.\"").unwrap();
        assert_eq!(back, Intention::Neutral);
    }
}
