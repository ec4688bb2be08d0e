//! Tool modules for the Taskpilot agent.

pub mod base;
pub mod chat_completion;
pub mod filesystem;
pub mod registry;
pub mod shell;
pub mod terminate;

use std::sync::Arc;

pub use base::{
    optional_bool, optional_i64, require_string, NeedsReasoningClient,
    NeedsSandbox, Tool, ToolError, ToolResult,
};
pub use registry::{ToolDeps, ToolRegistry};
pub use terminate::{TerminateTool, TERMINATE_TOOL_NAME};

/// Names accepted by [`builtin_tool`].
pub const BUILTIN_TOOLS: &[&str] = &[
    "bash",
    "read_file",
    "write_file",
    "list_dir",
    "create_chat_completion",
    TERMINATE_TOOL_NAME,
];

/// Construct a fresh instance of a built-in tool by name.
pub fn builtin_tool(name: &str) -> Option<Arc<dyn Tool>> {
    let tool: Arc<dyn Tool> = match name {
        "bash" => Arc::new(shell::BashTool::new()),
        "read_file" => Arc::new(filesystem::ReadFileTool::default()),
        "write_file" => Arc::new(filesystem::WriteFileTool::default()),
        "list_dir" => Arc::new(filesystem::ListDirTool::default()),
        "create_chat_completion" => Arc::new(chat_completion::CreateChatCompletionTool),
        TERMINATE_TOOL_NAME => Arc::new(TerminateTool),
        _ => return None,
    };
    Some(tool)
}
