//! Filesystem tools — read, write and list files inside the task's sandbox.
//!
//! Relative paths resolve against the sandbox working directory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use taskpilot_sandbox::SandboxClient;

use super::base::{
    optional_bool, require_string, shell_quote, NeedsSandbox, SandboxSlot, Tool, ToolError,
    ToolResult,
};

macro_rules! sandbox_aware {
    ($tool:ty) => {
        impl NeedsSandbox for $tool {
            fn attach_sandbox(&self, sandbox: Arc<SandboxClient>) {
                self.sandbox.attach(sandbox);
            }
        }
    };
}

// ─────────────────────────────────────────────
// ReadFileTool
// ─────────────────────────────────────────────

#[derive(Default)]
pub struct ReadFileTool {
    sandbox: SandboxSlot,
}

sandbox_aware!(ReadFileTool);

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the sandbox. Returns the full text content."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, absolute or relative to the working directory"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
        let path = self.sandbox.resolve(&require_string(&params, "path")?)?;
        let content = self.sandbox.get()?.read_file(&path).await?;
        debug!(path = %path, bytes = content.len(), "read_file");
        Ok(ToolResult::success(content))
    }

    fn as_sandbox_aware(&self) -> Option<&dyn NeedsSandbox> {
        Some(self)
    }
}

// ─────────────────────────────────────────────
// WriteFileTool
// ─────────────────────────────────────────────

#[derive(Default)]
pub struct WriteFileTool {
    sandbox: SandboxSlot,
}

sandbox_aware!(WriteFileTool);

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the sandbox, creating it if it doesn't exist or \
         overwriting it if it does. Parent directories are created automatically."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, absolute or relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
        let path = self.sandbox.resolve(&require_string(&params, "path")?)?;
        let content = require_string(&params, "content")?;
        self.sandbox.get()?.write_file(&path, &content).await?;
        Ok(ToolResult::success(format!(
            "Successfully wrote {} bytes to {path}",
            content.len()
        )))
    }

    fn as_sandbox_aware(&self) -> Option<&dyn NeedsSandbox> {
        Some(self)
    }
}

// ─────────────────────────────────────────────
// ListDirTool
// ─────────────────────────────────────────────

#[derive(Default)]
pub struct ListDirTool {
    sandbox: SandboxSlot,
}

sandbox_aware!(ListDirTool);

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the contents of a directory in the sandbox. Directories carry a trailing '/'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path (defaults to the working directory)"
                },
                "all": {
                    "type": "boolean",
                    "description": "Include hidden entries"
                }
            }
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
        let raw = params
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".");
        let path = self.sandbox.resolve(raw)?;
        let flags = if optional_bool(&params, "all") { "-1Ap" } else { "-1p" };
        let command = format!("ls {flags} -- {}", shell_quote(&path));

        let out = self.sandbox.get()?.run_command(&command, None).await?;
        if !out.success() {
            return Ok(ToolResult::failure(out.combined()));
        }
        let listing = out.stdout.trim_end();
        if listing.is_empty() {
            return Ok(ToolResult::success(format!("Directory {path} is empty")));
        }
        Ok(ToolResult::success(listing))
    }

    fn as_sandbox_aware(&self) -> Option<&dyn NeedsSandbox> {
        Some(self)
    }
}
