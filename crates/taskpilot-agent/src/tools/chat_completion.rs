//! Structured final answer tool.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{require_string, Tool, ToolError, ToolResult};

pub struct CreateChatCompletionTool;

#[async_trait]
impl Tool for CreateChatCompletionTool {
    fn name(&self) -> &str {
        "create_chat_completion"
    }

    fn description(&self) -> &str {
        "Creates a structured completion with specified output formatting."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "response": {
                    "type": "string",
                    "description": "The response text that should be delivered to the user."
                }
            },
            "required": ["response"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
        // Non-string answers are delivered as their JSON text.
        match params.get("response") {
            Some(Value::String(_)) => Ok(ToolResult::success(require_string(&params, "response")?)),
            Some(other) => Ok(ToolResult::success(other.to_string())),
            None => Err(ToolError::InvalidArguments(
                "Missing required parameter: response".into(),
            )),
        }
    }
}
