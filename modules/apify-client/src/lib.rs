pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{RunData, Tweet, TweetAuthor, TweetEntities, TweetScraperInput, TweetUrl};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apidojo/tweet-scraper.
const TWEET_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Per-request HTTP timeout. Long-polls ask Apify for at most 60s, so this
/// must stay above that.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_timeout(token, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(token: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize + ?Sized>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let api_resp: ApiResponse<RunData> = Self::parse(resp).await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    /// Callers bound the total wait with their own timeout.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let api_resp: ApiResponse<RunData> = Self::parse(resp).await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::parse(resp).await
    }

    /// Latest posts from one X/Twitter timeline, end-to-end: start run, poll, fetch results.
    pub async fn scrape_x_timeline(&self, handle: &str, limit: u32) -> Result<Vec<Tweet>> {
        tracing::info!(handle, limit, "Starting X/Twitter timeline scrape");

        let input = TweetScraperInput::timeline(handle, limit);
        let run = self.start_run(TWEET_SCRAPER, &input).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let tweets: Vec<Tweet> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        tracing::info!(handle, count = tweets.len(), "Fetched tweets");

        Ok(tweets)
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_api_is_a_network_error() {
        let client = ApifyClient::with_timeout("token".into(), Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = client.scrape_x_timeline("gabrielboric", 5).await.unwrap_err();
        assert!(matches!(err, ApifyError::Network(_) | ApifyError::Timeout), "{err}");
    }
}
