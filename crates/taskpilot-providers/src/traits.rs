//! Reasoning collaborator trait.
//!
//! The agent never talks HTTP directly; it goes through [`LlmProvider`].
//! `HttpProvider` in `http_provider.rs` covers all OpenAI-compatible APIs,
//! and tests substitute scripted implementations.

use async_trait::async_trait;
use taskpilot_core::config::LlmConfig;
use taskpilot_core::types::{LlmResponse, Message, ToolChoice, ToolDefinition};

use crate::error::LlmError;

/// Sampling settings passed with each completion.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

impl From<&LlmConfig> for LlmRequestConfig {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Plain completion: `system` messages are prepended to `messages`.
    async fn ask(&self, messages: &[Message], system: &[Message]) -> Result<String, LlmError>;

    /// Tool-enabled completion.
    ///
    /// Fails with [`LlmError::TokenLimitExceeded`] when the conversation no
    /// longer fits, and with [`LlmError::InvalidRequest`] when the message
    /// sequence is malformed.
    async fn ask_tool(
        &self,
        messages: &[Message],
        system: &[Message],
        tools: &[ToolDefinition],
        choice: ToolChoice,
    ) -> Result<LlmResponse, LlmError>;

    /// The model this provider instance talks to.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
