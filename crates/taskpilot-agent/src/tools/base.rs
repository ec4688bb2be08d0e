//! Tool trait — the interface every local and remote tool implements.
//!
//! Tools that need the task's sandbox or the reasoning collaborator expose a
//! capability through `as_sandbox_aware` / `as_reasoning_aware`; the registry
//! injects the dependency once at registration time.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use taskpilot_core::types::ToolDefinition;
use taskpilot_providers::LlmProvider;
use taskpilot_sandbox::{SandboxClient, SandboxError};

// ─────────────────────────────────────────────
// ToolResult
// ─────────────────────────────────────────────

/// Outcome of one tool invocation. `output` and `error` are exclusive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolResult {
    pub output: Option<String>,
    pub error: Option<String>,
    pub base64_image: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True when there is neither output text, error, nor image.
    pub fn is_empty(&self) -> bool {
        self.output.as_deref().map_or(true, str::is_empty)
            && self.error.is_none()
            && self.base64_image.is_none()
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.error, &self.output) {
            (Some(e), _) => write!(f, "Error: {e}"),
            (None, Some(o)) => f.write_str(o),
            (None, None) => Ok(()),
        }
    }
}

// ─────────────────────────────────────────────
// ToolError
// ─────────────────────────────────────────────

/// Declared failure kinds of the tool contract.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),
}

impl From<SandboxError> for ToolError {
    fn from(e: SandboxError) -> Self {
        ToolError::Execution(e.to_string())
    }
}

// ─────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────

/// A tool that runs against the task's sandbox.
pub trait NeedsSandbox: Send + Sync {
    fn attach_sandbox(&self, sandbox: Arc<SandboxClient>);
}

/// A tool that calls the reasoning collaborator itself.
pub trait NeedsReasoningClient: Send + Sync {
    fn attach_llm(&self, llm: Arc<dyn LlmProvider>);
}

/// Write-once holder for an injected sandbox client.
#[derive(Default)]
pub struct SandboxSlot(OnceLock<Arc<SandboxClient>>);

impl SandboxSlot {
    pub fn attach(&self, sandbox: Arc<SandboxClient>) {
        if self.0.set(sandbox).is_err() {
            debug!("sandbox already attached, keeping the first");
        }
    }

    pub fn get(&self) -> Result<&Arc<SandboxClient>, ToolError> {
        self.0
            .get()
            .ok_or_else(|| ToolError::Execution("no sandbox attached to this tool".into()))
    }

    /// Resolve `path` against the sandbox working directory.
    pub fn resolve(&self, path: &str) -> Result<String, ToolError> {
        let sandbox = self.get()?;
        if path.starts_with('/') {
            return Ok(path.to_string());
        }
        let base = sandbox.work_dir().trim_end_matches('/');
        let rel = path.trim_start_matches("./");
        Ok(if rel.is_empty() || rel == "." {
            base.to_string()
        } else {
            format!("{base}/{rel}")
        })
    }
}

/// Single-quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used by the collaborator to call this tool (e.g. `"bash"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the collaborator.
    fn description(&self) -> &str;

    /// JSON Schema for the parameters: `{"type": "object", "properties": {...}}`.
    fn parameters(&self) -> Value;

    /// Execute with parsed arguments.
    ///
    /// Must tolerate missing or mistyped arguments: validation failures are
    /// `ToolError::InvalidArguments`, never panics.
    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError>;

    /// Build the `ToolDefinition` sent to the collaborator.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }

    fn as_sandbox_aware(&self) -> Option<&dyn NeedsSandbox> {
        None
    }

    fn as_reasoning_aware(&self) -> Option<&dyn NeedsReasoningClient> {
        None
    }

    /// Release resources held by the tool. Called once at agent cleanup.
    async fn cleanup(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> Result<String, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing required parameter: {key}")))
}

/// Extract an optional integer param.
pub fn optional_i64(params: &HashMap<String, Value>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

/// Extract an optional boolean param (defaults to `false` if absent).
pub fn optional_bool(params: &HashMap<String, Value>, key: &str) -> bool {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_string_present() {
        let mut params = HashMap::new();
        params.insert("path".into(), json!("/workspace/foo.txt"));
        assert_eq!(require_string(&params, "path").unwrap(), "/workspace/foo.txt");
    }

    #[test]
    fn test_require_string_wrong_type() {
        let mut params = HashMap::new();
        params.insert("path".into(), json!(42));
        assert!(matches!(
            require_string(&params, "path"),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_optional_helpers() {
        let mut params = HashMap::new();
        params.insert("timeout".into(), json!(5));
        params.insert("force".into(), json!(true));
        assert_eq!(optional_i64(&params, "timeout"), Some(5));
        assert!(optional_bool(&params, "force"));
        assert!(!optional_bool(&params, "missing"));
    }

    #[test]
    fn test_result_display() {
        assert_eq!(ToolResult::success("done").to_string(), "done");
        assert_eq!(ToolResult::failure("boom").to_string(), "Error: boom");
        assert_eq!(ToolResult::default().to_string(), "");
    }

    #[test]
    fn test_result_emptiness() {
        assert!(ToolResult::default().is_empty());
        assert!(ToolResult::success("").is_empty());
        assert!(!ToolResult::success("").with_image("aW1n").is_empty());
        assert!(!ToolResult::failure("x").is_empty());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_unattached_slot_is_execution_error() {
        let slot = SandboxSlot::default();
        assert!(matches!(slot.get(), Err(ToolError::Execution(_))));
        assert!(slot.resolve("a.txt").is_err());
    }

    #[tokio::test]
    async fn test_to_definition_and_default_capabilities() {
        struct DummyTool;

        #[async_trait]
        impl Tool for DummyTool {
            fn name(&self) -> &str {
                "dummy"
            }
            fn description(&self) -> &str {
                "A test tool"
            }
            fn parameters(&self) -> Value {
                json!({"type": "object", "properties": {"msg": {"type": "string"}}})
            }
            async fn execute(
                &self,
                _params: HashMap<String, Value>,
            ) -> Result<ToolResult, ToolError> {
                Ok(ToolResult::success("ok"))
            }
        }

        let def = DummyTool.to_definition();
        assert_eq!(def.function.name, "dummy");
        assert_eq!(def.tool_type, "function");
        assert!(DummyTool.as_sandbox_aware().is_none());
        assert!(DummyTool.as_reasoning_aware().is_none());
        assert!(DummyTool.cleanup().await.is_ok());
    }
}
