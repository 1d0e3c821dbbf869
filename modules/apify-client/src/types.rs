use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Input for the apidojo/tweet-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct TweetScraperInput {
    #[serde(rename = "twitterHandles")]
    pub twitter_handles: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    pub sort: String,
}

impl TweetScraperInput {
    /// Newest-first timeline of a single handle.
    pub fn timeline(handle: &str, max_items: u32) -> Self {
        Self {
            twitter_handles: vec![handle.trim_start_matches('@').to_string()],
            max_items,
            sort: "Latest".to_string(),
        }
    }
}

/// Author info nested inside a Tweet.
#[derive(Debug, Clone, Deserialize)]
pub struct TweetAuthor {
    #[serde(rename = "userName", alias = "screen_name")]
    pub user_name: Option<String>,
    pub name: Option<String>,
}

/// A URL entity attached to a tweet.
#[derive(Debug, Clone, Deserialize)]
pub struct TweetUrl {
    pub url: Option<String>,
    #[serde(rename = "expanded_url", alias = "expandedUrl")]
    pub expanded_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetEntities {
    #[serde(default)]
    pub urls: Vec<TweetUrl>,
}

/// A single tweet from the Apify dataset.
///
/// The actor emits camelCase fields; the snake_case aliases accept records
/// shaped like the v1.1 timeline API.
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "fullText", alias = "full_text")]
    pub full_text: Option<String>,
    pub url: Option<String>,
    /// Source-native timestamp, e.g. `Sat Sep 02 14:25:02 +0000 2021`.
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(alias = "user")]
    pub author: Option<TweetAuthor>,
    #[serde(rename = "isRetweet")]
    pub is_retweet: Option<bool>,
    /// Present (non-null) when the record is a reshare of another tweet.
    #[serde(rename = "retweet", alias = "retweeted_status")]
    pub retweeted: Option<serde_json::Value>,
    pub entities: Option<TweetEntities>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<i64>,
    #[serde(rename = "retweetCount")]
    pub retweet_count: Option<i64>,
}

impl Tweet {
    /// Returns whichever text field is populated, preferring `full_text`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }

    pub fn author_handle(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.user_name.as_deref())
    }

    /// A tweet is a repost if either the flag is set or an embedded original is present.
    pub fn is_repost(&self) -> bool {
        self.is_retweet.unwrap_or(false)
            || self.retweeted.as_ref().is_some_and(|v| !v.is_null())
    }

    pub fn link_count(&self) -> usize {
        self.entities.as_ref().map_or(0, |e| e.urls.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_output_deserializes() {
        let tweet: Tweet = serde_json::from_str(
            r#"{
                "type": "tweet",
                "id": "1",
                "text": "Hoy firmamos https://t.co/abc",
                "createdAt": "Sat Sep 02 14:25:02 +0000 2023",
                "author": {"userName": "gabrielboric", "name": "Gabriel Boric"},
                "isRetweet": false,
                "entities": {"urls": [{"url": "https://t.co/abc", "expanded_url": "https://gob.cl"}]},
                "likeCount": 10
            }"#,
        )
        .unwrap();

        assert_eq!(tweet.author_handle(), Some("gabrielboric"));
        assert_eq!(tweet.created_at.as_deref(), Some("Sat Sep 02 14:25:02 +0000 2023"));
        assert!(!tweet.is_repost());
        assert_eq!(tweet.link_count(), 1);
    }

    #[test]
    fn timeline_shaped_record_deserializes() {
        let tweet: Tweet = serde_json::from_str(
            r#"{
                "created_at": "Sat Sep 02 14:25:02 +0000 2023",
                "full_text": "RT @otro: algo",
                "user": {"screen_name": "PamJiles"},
                "retweeted_status": {"id": "9"}
            }"#,
        )
        .unwrap();

        assert_eq!(tweet.author_handle(), Some("PamJiles"));
        assert_eq!(tweet.content(), Some("RT @otro: algo"));
        assert!(tweet.is_repost());
        assert_eq!(tweet.link_count(), 0);
    }

    #[test]
    fn null_retweet_is_not_a_repost() {
        let tweet: Tweet = serde_json::from_str(r#"{"text": "hola", "retweet": null}"#).unwrap();
        assert!(!tweet.is_repost());
    }

    #[test]
    fn timeline_input_strips_at_sign() {
        let input = TweetScraperInput::timeline("@Orrego", 20);
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["twitterHandles"][0], "Orrego");
        assert_eq!(json["maxItems"], 20);
        assert_eq!(json["sort"], "Latest");
    }
}
