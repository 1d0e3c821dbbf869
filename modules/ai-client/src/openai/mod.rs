mod client;
pub(crate) mod types;

use std::time::Duration;

use crate::error::{AiError, Result};

use client::OpenAiClient;

/// Upper bound on reply length. Annotation replies are a few words.
const DEFAULT_MAX_TOKENS: u32 = 256;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    base_url: Option<String>,
    timeout: Duration,
    max_tokens: u32,
}

impl OpenAi {
    /// The model is chosen per call in `chat_completion`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Per-request timeout applied to the underlying HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub(crate) fn client(&self) -> Result<OpenAiClient> {
        let client = OpenAiClient::new(&self.api_key, self.timeout)?;
        Ok(match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        })
    }

    /// Single system + user exchange against `model`, returning the reply text.
    pub async fn chat_completion(
        &self,
        model: &str,
        system: impl Into<String>,
        user: impl Into<String>,
        temperature: Option<f32>,
    ) -> Result<String> {
        let request = types::ChatRequest::new(model)
            .message(types::WireMessage::system(system))
            .message(types::WireMessage::user(user))
            .sized_for_model(self.max_tokens, temperature);

        let response = self.client()?.chat(&request).await?;
        response.first_text().ok_or(AiError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test");
        assert_eq!(ai.api_key, "sk-test");
        assert_eq!(ai.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_openai_builders() {
        let ai = OpenAi::new("sk-test")
            .with_base_url("https://custom.api.com")
            .with_timeout(Duration::from_secs(5))
            .with_max_tokens(16);
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
        assert_eq!(ai.timeout, Duration::from_secs(5));
        assert_eq!(ai.max_tokens, 16);
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_as_error() {
        let ai = OpenAi::new("sk-test")
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));

        let err = ai
            .chat_completion("gpt-3.5-turbo", "system", "user", Some(0.5))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }
}
