//! HTTP reasoning collaborator for OpenAI-compatible `/chat/completions` APIs.
//!
//! Besides the request/response plumbing this module owns two checks the
//! dispatcher relies on:
//! - token-limit detection, both from a local estimate (`maxInputTokens`) and
//!   from the API's own context-length error,
//! - message-sequence validation (every tool result must answer an earlier
//!   assistant tool call), surfaced as [`LlmError::InvalidRequest`].

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use taskpilot_core::config::LlmConfig;
use taskpilot_core::types::{
    ChatCompletionRequest, ChatCompletionResponse, LlmResponse, Message, ToolChoice,
    ToolDefinition,
};

use crate::error::LlmError;
use crate::traits::{LlmProvider, LlmRequestConfig};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Rough per-message overhead used by the token estimate.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    request: LlmRequestConfig,
    max_input_tokens: Option<u32>,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl HttpProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(HttpProvider {
            client,
            api_base,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request: LlmRequestConfig::from(config),
            max_input_tokens: config.max_input_tokens,
            extra_headers,
        })
    }

    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// Reject the request locally if the estimate exceeds `maxInputTokens`.
    fn check_token_budget(&self, messages: &[Value]) -> Result<(), LlmError> {
        let Some(limit) = self.max_input_tokens else {
            return Ok(());
        };
        let estimate = estimate_tokens(messages);
        if estimate > limit as usize {
            return Err(LlmError::TokenLimitExceeded(format!(
                "Request may exceed input token limit (Current: {}, Limit: {})",
                estimate, limit
            )));
        }
        Ok(())
    }

    async fn complete(
        &self,
        messages: &[Message],
        system: &[Message],
        tools: Option<&[ToolDefinition]>,
        choice: Option<ToolChoice>,
    ) -> Result<LlmResponse, LlmError> {
        let mut all: Vec<&Message> = system.iter().collect();
        all.extend(messages.iter());
        validate_messages(&all)?;

        let wire: Vec<Value> = all.iter().map(|m| to_wire(m)).collect();
        self.check_token_budget(&wire)?;

        debug!(
            model = %self.model,
            messages = wire.len(),
            tools = tools.map_or(0, |t| t.len()),
            "Calling LLM"
        );

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: wire,
            tools: tools.filter(|t| !t.is_empty()).map(|t| t.to_vec()),
            tool_choice: tools.filter(|t| !t.is_empty()).and(choice),
            max_tokens: Some(self.request.max_tokens),
            temperature: Some(self.request.temperature),
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .headers(self.extra_headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                LlmError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(status = %status, body = %text, "API error");
            if is_context_length_error(&text) {
                return Err(LlmError::TokenLimitExceeded(text));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let resp = parsed
            .into_response()
            .ok_or_else(|| LlmError::Parse("response contained no choices".to_string()))?;

        debug!(
            has_content = resp.content.is_some(),
            tool_calls = resp.tool_calls.len(),
            finish_reason = resp.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );
        Ok(resp)
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn ask(&self, messages: &[Message], system: &[Message]) -> Result<String, LlmError> {
        let resp = self.complete(messages, system, None, None).await?;
        Ok(resp.content.unwrap_or_default())
    }

    async fn ask_tool(
        &self,
        messages: &[Message],
        system: &[Message],
        tools: &[ToolDefinition],
        choice: ToolChoice,
    ) -> Result<LlmResponse, LlmError> {
        self.complete(messages, system, Some(tools), Some(choice)).await
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn display_name(&self) -> &str {
        "OpenAI-compatible"
    }
}

// ─────────────────────────────────────────────
// Wire helpers
// ─────────────────────────────────────────────

/// Render a message in the chat-completions wire shape.
///
/// Inline images turn `content` into a text + `image_url` part list.
fn to_wire(msg: &Message) -> Value {
    let mut value = serde_json::to_value(msg).unwrap_or(Value::Null);
    if let Some(obj) = value.as_object_mut() {
        if let Some(image) = obj.remove("base64_image").and_then(|v| v.as_str().map(String::from))
        {
            let text = msg.content().unwrap_or_default();
            obj.insert(
                "content".to_string(),
                json!([
                    {"type": "text", "text": text},
                    {"type": "image_url", "image_url": {"url": format!("data:image/jpeg;base64,{}", image)}}
                ]),
            );
        }
    }
    value
}

/// Every tool result must reference a tool call issued earlier in the sequence.
fn validate_messages(messages: &[&Message]) -> Result<(), LlmError> {
    if messages.is_empty() {
        return Err(LlmError::InvalidRequest("no messages to send".to_string()));
    }
    let mut issued: HashSet<&str> = HashSet::new();
    for msg in messages {
        match msg {
            Message::Assistant { .. } => {
                issued.extend(msg.tool_calls().iter().map(|c| c.id.as_str()));
            }
            Message::Tool { tool_call_id, .. } => {
                if !issued.contains(tool_call_id.as_str()) {
                    return Err(LlmError::InvalidRequest(format!(
                        "tool result '{}' does not answer any earlier tool call",
                        tool_call_id
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Character-based estimate (~4 chars per token) plus fixed per-message overhead.
fn estimate_tokens(messages: &[Value]) -> usize {
    messages
        .iter()
        .map(|m| m.to_string().chars().count() / 4 + MESSAGE_OVERHEAD_TOKENS)
        .sum()
}

fn is_context_length_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("context_length_exceeded") || lower.contains("maximum context length")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
