//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `LlmConfig`, `SandboxConfig`,
//! `EventsConfig`, and the list of remote `ToolProviderConfig`s.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.taskpilot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub sandbox: SandboxConfig,
    pub events: EventsConfig,
    /// Remote tool providers connected for every task.
    pub tool_providers: Vec<ToolProviderConfig>,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Step loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Step budget per run.
    pub max_steps: u32,
    /// Maximum characters kept from a single tool observation.
    pub max_observe: usize,
    /// Run a planning turn before the step loop.
    pub should_plan: bool,
    /// Preferred response language, passed into the system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Per-tool invocation timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_observe: 10_000,
            should_plan: false,
            language: None,
            tool_timeout_secs: None,
        }
    }
}

// ─────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────

/// Reasoning collaborator endpoint (OpenAI-compatible chat completions).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: String,
    /// Custom API base URL (defaults to the OpenAI endpoint).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Estimated prompt-token ceiling; requests above it fail with a token-limit error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u32>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_key: String::new(),
            api_base: None,
            max_tokens: 4096,
            temperature: 0.0,
            max_input_tokens: None,
            extra_headers: None,
        }
    }
}

impl LlmConfig {
    /// Whether an API key is present.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Sandbox
// ─────────────────────────────────────────────

/// Per-task container settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxConfig {
    /// Container image.
    pub image: String,
    /// Host directory under which each task gets its own workspace.
    pub host_workspace_root: String,
    pub memory_limit: String,
    pub cpu_limit: f64,
    pub network_enabled: bool,
    /// Default timeout for sandboxed commands.
    pub command_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "python:3.12-slim".to_string(),
            host_workspace_root: "~/.taskpilot/workspace".to_string(),
            memory_limit: "2g".to_string(),
            cpu_limit: 1.0,
            network_enabled: true,
            command_timeout_secs: 120,
        }
    }
}

// ─────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────

/// Per-task event stream settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventsConfig {
    /// Bounded queue capacity per task stream.
    pub queue_capacity: usize,
    /// Seconds a consumer waits before a heartbeat frame is produced.
    pub heartbeat_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            heartbeat_secs: 10,
        }
    }
}

// ─────────────────────────────────────────────
// Remote tool providers
// ─────────────────────────────────────────────

/// How a remote provider is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Spawned subprocess speaking line-delimited JSON-RPC on stdio.
    Subprocess,
    /// Persistent server-sent-events stream plus POST endpoint.
    Stream,
}

/// Connection descriptor for a remote tool provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolProviderConfig {
    pub id: String,
    pub name: String,
    /// Command to spawn (subprocess transport).
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Stream URL; non-empty selects the stream transport.
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl ToolProviderConfig {
    pub fn transport(&self) -> TransportKind {
        if self.url.trim().is_empty() {
            TransportKind::Subprocess
        } else {
            TransportKind::Stream
        }
    }

    /// Human-readable identity for logs and events.
    pub fn label(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.id.is_empty() {
            &self.id
        } else if !self.url.is_empty() {
            &self.url
        } else {
            &self.command
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.max_steps, 20);
        assert_eq!(cfg.agent.max_observe, 10_000);
        assert_eq!(cfg.sandbox.memory_limit, "2g");
        assert!(cfg.sandbox.network_enabled);
        assert_eq!(cfg.events.heartbeat_secs, 10);
        assert!(cfg.tool_providers.is_empty());
    }

    #[test]
    fn test_provider_transport_selection() {
        let stdio = ToolProviderConfig {
            command: "uvx".into(),
            args: vec!["mcp-server-fetch".into()],
            ..Default::default()
        };
        assert_eq!(stdio.transport(), TransportKind::Subprocess);

        let sse = ToolProviderConfig {
            url: "http://localhost:8931/sse".into(),
            command: "ignored".into(),
            ..Default::default()
        };
        assert_eq!(sse.transport(), TransportKind::Stream);
    }

    #[test]
    fn test_provider_label_fallbacks() {
        let p = ToolProviderConfig {
            id: "p1".into(),
            command: "node".into(),
            ..Default::default()
        };
        assert_eq!(p.label(), "p1");
    }

    #[test]
    fn test_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["agent"].get("maxObserve").is_some());
        assert!(json["sandbox"].get("hostWorkspaceRoot").is_some());
        assert!(json.get("toolProviders").is_some());
    }

    #[test]
    fn test_provider_from_json() {
        let p: ToolProviderConfig = serde_json::from_str(
            r#"{"id":"fs","command":"npx","args":["-y","server-fs"],"env":{"A":"1"}}"#,
        )
        .unwrap();
        assert_eq!(p.args.len(), 2);
        assert_eq!(p.env["A"], "1");
        assert!(p.url.is_empty());
    }
}
