//! Terminate tool — the special tool that ends a run.
//!
//! The dispatcher moves the agent to FINISHED after any call to this tool,
//! whatever the tool itself returns.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{require_string, Tool, ToolError, ToolResult};

pub const TERMINATE_TOOL_NAME: &str = "terminate";

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met OR if the assistant cannot \
         proceed further with the task. When you have finished all the tasks, call this \
         tool to end the work."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
        let status = require_string(&params, "status")?;
        if status != "success" && status != "failure" {
            return Err(ToolError::InvalidArguments(format!(
                "status must be 'success' or 'failure', got '{status}'"
            )));
        }
        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_reports_status() {
        let mut params = HashMap::new();
        params.insert("status".into(), json!("success"));
        let result = TerminateTool.execute(params).await.unwrap();
        assert_eq!(
            result.output.as_deref(),
            Some("The interaction has been completed with status: success")
        );
    }

    #[tokio::test]
    async fn test_terminate_rejects_unknown_status() {
        let mut params = HashMap::new();
        params.insert("status".into(), json!("maybe"));
        assert!(matches!(
            TerminateTool.execute(params).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(TerminateTool.execute(HashMap::new()).await.is_err());
    }
}
