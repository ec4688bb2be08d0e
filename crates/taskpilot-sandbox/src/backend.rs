//! Sandboxed execution backend contract.
//!
//! Every operation addresses the sandbox by its stable name
//! (see [`crate::spec::sandbox_name`]).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SandboxError;
use crate::spec::{ContainerStatus, ExecOutput, SandboxSpec};

#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Current status; `Absent` when no such sandbox exists.
    async fn status(&self, name: &str) -> Result<ContainerStatus, SandboxError>;

    /// Create (but do not start) a sandbox.
    async fn create(&self, spec: &SandboxSpec) -> Result<(), SandboxError>;

    async fn start(&self, name: &str) -> Result<(), SandboxError>;

    /// Run a shell command inside the sandbox.
    async fn exec(
        &self,
        name: &str,
        command: &str,
        work_dir: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError>;

    async fn copy_to(&self, name: &str, local: &Path, sandbox_path: &str)
        -> Result<(), SandboxError>;

    async fn copy_from(
        &self,
        name: &str,
        sandbox_path: &str,
        local: &Path,
    ) -> Result<(), SandboxError>;

    async fn read_file(&self, name: &str, path: &str) -> Result<String, SandboxError>;

    async fn write_file(&self, name: &str, path: &str, content: &str) -> Result<(), SandboxError>;

    /// Force-remove the sandbox. Removing an absent sandbox succeeds.
    async fn remove(&self, name: &str) -> Result<(), SandboxError>;
}
