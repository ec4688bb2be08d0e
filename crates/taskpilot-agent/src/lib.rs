//! Taskpilot Agent — step loop, tool dispatch, tools, and the task table.
//!
//! This crate contains:
//! - **memory**: append-only conversation log
//! - **tools**: Tool trait, capability injection, registry, built-in tools
//! - **mcp**: remote tool providers over subprocess and event-stream transports
//! - **dispatcher**: think (select tools) and act (run tools) for one step
//! - **runner**: the agent state machine and its step loop
//! - **task_manager**: per-task agents with single-consumer event streams

pub mod dispatcher;
pub mod error;
pub mod mcp;
pub mod memory;
pub mod prompt;
pub mod runner;
pub mod state;
pub mod task_manager;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{StepContext, ToolDispatcher};
pub use error::{AgentError, DispatchError, RegistryError, TaskError};
pub use mcp::{McpError, ToolHost};
pub use memory::Memory;
pub use runner::{Agent, AgentHandle, AgentSettings, ToolSpec};
pub use state::{AgentControl, AgentState};
pub use task_manager::{TaskEvents, TaskInfo, TaskManager};
pub use tools::{Tool, ToolRegistry, ToolResult};
