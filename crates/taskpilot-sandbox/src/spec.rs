//! Container description for one task.

use std::path::{Path, PathBuf};

use taskpilot_core::config::SandboxConfig;
use taskpilot_core::utils::safe_filename;

/// Where the host workspace root is mounted inside every sandbox.
pub const SANDBOX_WORKSPACE: &str = "/workspace";

/// Host subdirectories of the task workspace mounted as sandbox caches.
pub const CACHE_MOUNTS: [(&str, &str); 3] = [
    (".cache", "/root/.cache"),
    (".local", "/root/.local"),
    (".npm", "/root/.npm"),
];

const ENVIRONMENT: [(&str, &str); 6] = [
    ("PYTHONUNBUFFERED", "1"),
    ("TERM", "dumb"),
    ("PS1", "$ "),
    ("PROMPT_COMMAND", ""),
    ("UV_INDEX_URL", "https://mirrors.aliyun.com/pypi/simple/"),
    ("NPM_REGISTRY", "https://registry.npmmirror.com"),
];

/// Lifecycle status reported by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerStatus {
    Absent,
    Created,
    Running,
    Stopped,
}

/// A host → sandbox bind mount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub target: String,
}

/// Everything a backend needs to create a sandbox.
#[derive(Clone, Debug)]
pub struct SandboxSpec {
    pub name: String,
    pub image: String,
    pub memory_limit: String,
    pub cpu_limit: f64,
    pub network_enabled: bool,
    pub work_dir: String,
    pub mounts: Vec<Mount>,
    pub env: Vec<(String, String)>,
}

impl SandboxSpec {
    pub fn for_task(
        task_id: &str,
        host_workspace: &Path,
        work_dir: &str,
        config: &SandboxConfig,
    ) -> Self {
        let mut mounts: Vec<Mount> = CACHE_MOUNTS
            .iter()
            .map(|(sub, target)| Mount {
                host: host_workspace.join(sub),
                target: target.to_string(),
            })
            .collect();
        mounts.push(Mount {
            host: host_workspace.to_path_buf(),
            target: SANDBOX_WORKSPACE.to_string(),
        });

        SandboxSpec {
            name: sandbox_name(task_id),
            image: config.image.clone(),
            memory_limit: config.memory_limit.clone(),
            cpu_limit: config.cpu_limit,
            network_enabled: config.network_enabled,
            work_dir: work_dir.to_string(),
            mounts,
            env: ENVIRONMENT
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Stable container name for a task id.
pub fn sandbox_name(task_id: &str) -> String {
    format!("taskpilot-sandbox-{}", safe_filename(task_id))
}

/// Result of one sandboxed command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout, then stderr and the exit code when relevant.
    pub fn combined(&self) -> String {
        let mut parts = Vec::new();
        if !self.stdout.is_empty() {
            parts.push(self.stdout.clone());
        }
        if !self.stderr.is_empty() {
            parts.push(format!("STDERR:\n{}", self.stderr));
        }
        if self.exit_code != 0 {
            parts.push(format!("Exit code: {}", self.exit_code));
        }
        parts.join("\n")
    }
}
