//! Per-task sandboxes for Taskpilot.
//!
//! - [`manager::SandboxManager`] — shared task-id → sandbox table with
//!   per-task-id serialized create-or-reuse
//! - [`manager::SandboxClient`] — per-task handle used by tools
//! - [`backend::SandboxBackend`] — create/start/exec/copy/read/write/remove contract
//! - [`docker::DockerCli`] — backend driving the `docker` CLI

pub mod backend;
pub mod docker;
pub mod error;
pub mod manager;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod spec;

pub use backend::SandboxBackend;
pub use docker::DockerCli;
pub use error::SandboxError;
pub use manager::{EnsureOutcome, SandboxClient, SandboxHandle, SandboxManager};
pub use spec::{ContainerStatus, ExecOutput, SandboxSpec, SANDBOX_WORKSPACE};
