//! Docker backend driven through the `docker` CLI.
//!
//! Every call spawns `docker <args>` with piped output and a timeout;
//! "No such container" on stderr maps to [`SandboxError::NotFound`].

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::backend::SandboxBackend;
use crate::error::SandboxError;
use crate::spec::{ContainerStatus, ExecOutput, SandboxSpec};

/// Timeout for lifecycle calls (inspect, create, start, rm, cp).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// Keeps a freshly created container alive so commands can be exec'd into it.
const KEEPALIVE: [&str; 3] = ["tail", "-f", "/dev/null"];

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different CLI binary (e.g. `podman`).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(
        &self,
        args: &[String],
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        debug!(binary = %self.binary, args = ?args, "docker call");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Backend(format!("Failed to spawn {}: {e}", self.binary)))?;

        if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(bytes).await?;
            drop(pipe);
        }

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ExecOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                exit_code: output.status.code().unwrap_or(-1),
            }),
            Ok(Err(e)) => Err(SandboxError::Io(e)),
            Err(_) => Err(SandboxError::Timeout(timeout.as_secs())),
        }
    }

    /// Run a control command; non-zero exit becomes an error.
    async fn control(&self, name: &str, args: Vec<String>) -> Result<ExecOutput, SandboxError> {
        let out = self.run(&args, None, CONTROL_TIMEOUT).await?;
        check(name, out)
    }
}

fn check(name: &str, out: ExecOutput) -> Result<ExecOutput, SandboxError> {
    if out.success() {
        Ok(out)
    } else if is_missing(&out.stderr) {
        Err(SandboxError::NotFound(name.to_string()))
    } else {
        Err(SandboxError::Backend(out.stderr.trim().to_string()))
    }
}

fn is_missing(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

fn parse_status(raw: &str) -> ContainerStatus {
    match raw.trim() {
        "running" => ContainerStatus::Running,
        "created" => ContainerStatus::Created,
        _ => ContainerStatus::Stopped,
    }
}

/// Arguments for `docker create`.
fn create_args(spec: &SandboxSpec) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "create".into(),
        "--name".into(),
        spec.name.clone(),
        "--memory".into(),
        spec.memory_limit.clone(),
        "--cpus".into(),
        spec.cpu_limit.to_string(),
        "-w".into(),
        spec.work_dir.clone(),
    ];
    if !spec.network_enabled {
        args.push("--network".into());
        args.push("none".into());
    }
    for mount in &spec.mounts {
        args.push("-v".into());
        args.push(format!("{}:{}", mount.host.display(), mount.target));
    }
    for (key, value) in &spec.env {
        args.push("-e".into());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.image.clone());
    args.extend(KEEPALIVE.iter().map(|s| s.to_string()));
    args
}

#[async_trait]
impl SandboxBackend for DockerCli {
    async fn status(&self, name: &str) -> Result<ContainerStatus, SandboxError> {
        let args = vec![
            "inspect".into(),
            "-f".into(),
            "{{.State.Status}}".into(),
            name.to_string(),
        ];
        let out = self.run(&args, None, CONTROL_TIMEOUT).await?;
        if out.success() {
            Ok(parse_status(&out.stdout))
        } else if is_missing(&out.stderr) {
            Ok(ContainerStatus::Absent)
        } else {
            Err(SandboxError::Backend(out.stderr.trim().to_string()))
        }
    }

    async fn create(&self, spec: &SandboxSpec) -> Result<(), SandboxError> {
        info!(name = %spec.name, image = %spec.image, "Creating sandbox container");
        self.control(&spec.name, create_args(spec)).await.map(|_| ())
    }

    async fn start(&self, name: &str) -> Result<(), SandboxError> {
        self.control(name, vec!["start".into(), name.to_string()])
            .await
            .map(|_| ())
    }

    async fn exec(
        &self,
        name: &str,
        command: &str,
        work_dir: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        let args = vec![
            "exec".into(),
            "-w".into(),
            work_dir.to_string(),
            name.to_string(),
            "bash".into(),
            "-lc".into(),
            command.to_string(),
        ];
        let out = self.run(&args, None, timeout).await?;
        if !out.success() && is_missing(&out.stderr) {
            return Err(SandboxError::NotFound(name.to_string()));
        }
        Ok(out)
    }

    async fn copy_to(
        &self,
        name: &str,
        local: &Path,
        sandbox_path: &str,
    ) -> Result<(), SandboxError> {
        let args = vec![
            "cp".into(),
            local.display().to_string(),
            format!("{name}:{sandbox_path}"),
        ];
        self.control(name, args).await.map(|_| ())
    }

    async fn copy_from(
        &self,
        name: &str,
        sandbox_path: &str,
        local: &Path,
    ) -> Result<(), SandboxError> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let args = vec![
            "cp".into(),
            format!("{name}:{sandbox_path}"),
            local.display().to_string(),
        ];
        self.control(name, args).await.map(|_| ())
    }

    async fn read_file(&self, name: &str, path: &str) -> Result<String, SandboxError> {
        let args = vec!["exec".into(), name.to_string(), "cat".into(), path.to_string()];
        self.control(name, args).await.map(|out| out.stdout)
    }

    async fn write_file(&self, name: &str, path: &str, content: &str) -> Result<(), SandboxError> {
        let args = vec![
            "exec".into(),
            "-i".into(),
            name.to_string(),
            "sh".into(),
            "-c".into(),
            r#"mkdir -p "$(dirname "$1")" && cat > "$1""#.into(),
            "sh".into(),
            path.to_string(),
        ];
        let out = self
            .run(&args, Some(content.as_bytes()), CONTROL_TIMEOUT)
            .await?;
        check(name, out).map(|_| ())
    }

    async fn remove(&self, name: &str) -> Result<(), SandboxError> {
        let args = vec!["rm".into(), "-f".into(), name.to_string()];
        match self.control(name, args).await {
            Ok(_) | Err(SandboxError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
