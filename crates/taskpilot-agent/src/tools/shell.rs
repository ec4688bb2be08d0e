//! Bash tool — run a shell command inside the task's sandbox.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use taskpilot_core::utils::truncate_string;
use taskpilot_sandbox::{SandboxClient, SandboxError};

use super::base::{optional_i64, require_string, NeedsSandbox, SandboxSlot, Tool, ToolError, ToolResult};

pub struct BashTool {
    sandbox: SandboxSlot,
}

impl BashTool {
    pub fn new() -> Self {
        Self {
            sandbox: SandboxSlot::default(),
        }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

impl NeedsSandbox for BashTool {
    fn attach_sandbox(&self, sandbox: Arc<SandboxClient>) {
        self.sandbox.attach(sandbox);
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command in the task sandbox and return its output. \
         Long-running commands should be started in the background. \
         The working directory persists between calls."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (defaults to the sandbox command timeout)",
                    "minimum": 1
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
        let command = require_string(&params, "command")?;
        let timeout = optional_i64(&params, "timeout")
            .filter(|&s| s > 0)
            .map(|s| Duration::from_secs(s as u64));
        let sandbox = self.sandbox.get()?;

        info!(task_id = %sandbox.task_id(), command = %truncate_string(&command, 120), "bash");

        match sandbox.run_command(&command, timeout).await {
            Ok(out) => {
                if !out.success() {
                    warn!(exit_code = out.exit_code, "bash command exited non-zero");
                }
                Ok(ToolResult::success(out.combined()))
            }
            Err(SandboxError::Timeout(secs)) => Ok(ToolResult::failure(format!(
                "Command timed out after {secs} seconds"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn as_sandbox_aware(&self) -> Option<&dyn NeedsSandbox> {
        Some(self)
    }
}
