use anyhow::{Context, Result};
use apify_client::{ApifyClient, Tweet};
use async_trait::async_trait;
use tracing::debug;
use tweetlens_common::RawPost;

use crate::traits::FeedSource;

/// Timelines via the Apify tweet-scraper actor.
pub struct ApifyFeed {
    client: ApifyClient,
}

impl ApifyFeed {
    pub fn new(client: ApifyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSource for ApifyFeed {
    async fn fetch_recent(&self, handle: &str, limit: u32) -> Result<Vec<RawPost>> {
        let tweets = self
            .client
            .scrape_x_timeline(handle, limit)
            .await
            .with_context(|| format!("timeline fetch for @{handle} failed"))?;
        debug!(handle, count = tweets.len(), "Timeline fetched");

        Ok(tweets
            .into_iter()
            .map(|tweet| raw_post_from_tweet(tweet, handle))
            .collect())
    }
}

/// Map one scraped tweet to a source record. Items without an author take the
/// handle whose timeline they came from.
pub fn raw_post_from_tweet(tweet: Tweet, handle: &str) -> RawPost {
    let author = tweet
        .author_handle()
        .map(str::to_string)
        .or_else(|| Some(handle.trim_start_matches('@').to_string()));

    RawPost {
        is_repost: tweet.is_repost(),
        has_links: tweet.link_count() > 0,
        text: tweet.content().map(str::to_string),
        author,
        created_at: tweet.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(json: &str) -> Tweet {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn maps_original_tweet() {
        let raw = raw_post_from_tweet(
            tweet(
                r#"{
                    "fullText": "Avanzamos en la agenda https://t.co/abc",
                    "createdAt": "Sat Sep 02 14:25:02 +0000 2023",
                    "author": {"userName": "GiorgioJackson"},
                    "isRetweet": false,
                    "entities": {"urls": [{"url": "https://t.co/abc"}]}
                }"#,
            ),
            "GiorgioJackson",
        );
        assert_eq!(raw.author.as_deref(), Some("GiorgioJackson"));
        assert_eq!(raw.created_at.as_deref(), Some("Sat Sep 02 14:25:02 +0000 2023"));
        assert_eq!(raw.text.as_deref(), Some("Avanzamos en la agenda https://t.co/abc"));
        assert!(!raw.is_repost);
        assert!(raw.has_links);
    }

    #[test]
    fn embedded_original_marks_repost() {
        let raw = raw_post_from_tweet(
            tweet(
                r#"{
                    "text": "RT @x: algo",
                    "createdAt": "Sat Sep 02 14:25:02 +0000 2023",
                    "retweet": {"id": "9"}
                }"#,
            ),
            "@mbachelet",
        );
        assert!(raw.is_repost);
        assert!(!raw.has_links);
        assert_eq!(raw.author.as_deref(), Some("mbachelet"));
    }
}
