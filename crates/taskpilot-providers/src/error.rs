//! Reasoning collaborator failure kinds.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// The request would not fit (or did not fit) in the model's context window.
    #[error("token limit exceeded: {0}")]
    TokenLimitExceeded(String),

    /// The request itself is malformed (bad message sequence, bad arguments).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl LlmError {
    pub fn is_token_limit(&self) -> bool {
        matches!(self, LlmError::TokenLimitExceeded(_))
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, LlmError::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Http(e.to_string())
    }
}
