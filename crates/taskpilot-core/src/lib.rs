//! Taskpilot Core — shared types, event bus, configuration, and utilities.
//!
//! - **types**: conversation messages, tool calls, tool definitions, LLM responses
//! - **bus**: typed lifecycle events, in-process fan-out, per-task event queues
//! - **config**: JSON config schema + loader with env overrides
//! - **utils**: path helpers and string truncation

pub mod bus;
pub mod config;
pub mod types;
pub mod utils;

pub use bus::{Event, EventBus, EventFamily, EventFilter, EventKind};
pub use types::{Message, Role, ToolCall, ToolChoice, ToolDefinition};
