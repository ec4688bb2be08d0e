//! Sandbox failure kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// An operation ran before `ensure` created the sandbox.
    #[error("Sandbox not initialized")]
    NotInitialized,

    /// The backend has no container under this name.
    #[error("sandbox '{0}' not found")]
    NotFound(String),

    #[error("sandbox backend error: {0}")]
    Backend(String),

    #[error("command timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
