use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::error::{AiError, Result};
use crate::util::error_excerpt;

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Longest error body carried into an `AiError::Api`.
const MAX_ERROR_BODY: usize = 512;

pub(crate) struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Config(e.to_string()))?;

        Ok(Self {
            api_key: api_key.to_string(),
            http,
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| AiError::Config(format!("invalid API key header: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, messages = request.messages.len(), "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message: error_excerpt(&error_text, MAX_ERROR_BODY),
            });
        }

        let chat_response: ChatResponse = response.json().await?;
        if let Some(usage) = &chat_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "OpenAI usage"
            );
        }
        Ok(chat_response)
    }
}
