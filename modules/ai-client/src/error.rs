use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from model")]
    EmptyResponse,
}

impl AiError {
    /// Whether a second attempt has a reasonable chance of succeeding.
    /// Rate limits and server-side errors qualify; bad requests and auth do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Network(_) | AiError::Timeout => true,
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::Config(_) | AiError::Parse(_) | AiError::EmptyResponse => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout
        } else if e.is_decode() {
            AiError::Parse(e.to_string())
        } else {
            AiError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}
