//! Agent-level failure kinds.

use thiserror::Error;

use taskpilot_providers::LlmError;
use taskpilot_sandbox::SandboxError;

use crate::state::AgentState;

/// Tool-name collision at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
}

/// Failures that escape the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Tool calls required but none provided")]
    ToolCallsRequired,

    /// Argument validation failure from the collaborator; never swallowed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("cannot run agent from state {0}")]
    InvalidState(AgentState),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The task's sandbox could not be created during prepare.
    #[error("sandbox unavailable: {0}")]
    Sandbox(#[from] SandboxError),
}

/// Task table failures.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task '{0}' not found")]
    NotFound(String),

    #[error("task '{0}' was already started")]
    AlreadyStarted(String),

    #[error("event stream of task '{0}' is already taken")]
    StreamTaken(String),

    #[error("task '{0}' aborted before completing")]
    Aborted(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}
