//! Sandbox lifecycle: one sandbox per task id.
//!
//! [`SandboxManager`] is shared by all tasks. It owns the task-id → sandbox
//! table and serializes create-or-reuse per task id with an async mutex, so
//! concurrent `ensure` calls for the same id converge on one sandbox.
//!
//! [`SandboxClient`] is the per-task view tools talk to. Every operation
//! fails with [`SandboxError::NotInitialized`] until `ensure` has run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use taskpilot_core::bus::{EventBus, EventKind};
use taskpilot_core::config::SandboxConfig;

use crate::backend::SandboxBackend;
use crate::error::SandboxError;
use crate::spec::{sandbox_name, ContainerStatus, ExecOutput, SandboxSpec, CACHE_MOUNTS};

/// A live sandbox as recorded in the manager's table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxHandle {
    pub task_id: String,
    pub name: String,
    pub work_dir: String,
    pub host_workspace: PathBuf,
}

/// What `ensure` had to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    /// An existing stopped sandbox was started.
    Started,
    Reused,
}

// ─────────────────────────────────────────────
// SandboxManager
// ─────────────────────────────────────────────

pub struct SandboxManager {
    backend: Arc<dyn SandboxBackend>,
    config: SandboxConfig,
    table: StdMutex<HashMap<String, SandboxHandle>>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SandboxManager {
    pub fn new(backend: Arc<dyn SandboxBackend>, config: SandboxConfig) -> Self {
        Self {
            backend,
            config,
            table: StdMutex::new(HashMap::new()),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn SandboxBackend> {
        &self.backend
    }

    fn task_lock(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the per-task lock entry once nobody else holds it.
    fn release_lock(&self, task_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(task_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(task_id);
        }
    }

    /// Create the task's sandbox, or reuse (and if needed start) an existing one.
    pub async fn ensure(
        &self,
        task_id: &str,
        host_workspace: &Path,
        work_dir: &str,
    ) -> Result<(SandboxHandle, EnsureOutcome), SandboxError> {
        let lock = self.task_lock(task_id);
        let result = {
            let _guard = lock.lock().await;
            self.ensure_locked(task_id, host_workspace, work_dir).await
        };
        drop(lock);
        self.release_lock(task_id);
        result
    }

    async fn ensure_locked(
        &self,
        task_id: &str,
        host_workspace: &Path,
        work_dir: &str,
    ) -> Result<(SandboxHandle, EnsureOutcome), SandboxError> {
        let name = sandbox_name(task_id);
        let outcome = match self.backend.status(&name).await? {
            ContainerStatus::Running | ContainerStatus::Created => {
                debug!(task_id, sandbox = %name, "Reusing sandbox");
                EnsureOutcome::Reused
            }
            ContainerStatus::Stopped => {
                info!(task_id, sandbox = %name, "Starting stopped sandbox");
                self.backend.start(&name).await?;
                EnsureOutcome::Started
            }
            ContainerStatus::Absent => {
                info!(task_id, sandbox = %name, "Creating new sandbox");
                for (dir, _) in CACHE_MOUNTS {
                    tokio::fs::create_dir_all(host_workspace.join(dir)).await?;
                }
                let spec = SandboxSpec::for_task(task_id, host_workspace, work_dir, &self.config);
                self.backend.create(&spec).await?;
                self.backend.start(&name).await?;
                EnsureOutcome::Created
            }
        };

        let handle = SandboxHandle {
            task_id: task_id.to_string(),
            name,
            work_dir: work_dir.to_string(),
            host_workspace: host_workspace.to_path_buf(),
        };
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.to_string(), handle.clone());
        Ok((handle, outcome))
    }

    /// Tear down the task's sandbox. Returns `false` if nothing was recorded.
    pub async fn remove(&self, task_id: &str) -> Result<bool, SandboxError> {
        let lock = self.task_lock(task_id);
        let result = {
            let _guard = lock.lock().await;
            // The entry stays until the backend confirms, so a failed
            // removal can be retried.
            match self.get(task_id) {
                Some(h) => {
                    info!(task_id, sandbox = %h.name, "Removing sandbox");
                    self.backend.remove(&h.name).await.map(|_| {
                        self.table
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(task_id);
                        true
                    })
                }
                None => Ok(false),
            }
        };
        drop(lock);
        self.release_lock(task_id);
        result
    }

    pub fn get(&self, task_id: &str) -> Option<SandboxHandle> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.get(task_id).is_some()
    }

    pub fn count(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// ─────────────────────────────────────────────
// SandboxClient
// ─────────────────────────────────────────────

/// Per-task sandbox access used by tools.
pub struct SandboxClient {
    manager: Arc<SandboxManager>,
    task_id: String,
    host_workspace: PathBuf,
    work_dir: String,
    command_timeout: Duration,
    handle: RwLock<Option<SandboxHandle>>,
    events: Option<Arc<EventBus>>,
}

impl SandboxClient {
    pub fn new(
        manager: Arc<SandboxManager>,
        task_id: impl Into<String>,
        host_workspace: impl Into<PathBuf>,
        work_dir: impl Into<String>,
    ) -> Self {
        let command_timeout = Duration::from_secs(manager.config().command_timeout_secs);
        Self {
            manager,
            task_id: task_id.into(),
            host_workspace: host_workspace.into(),
            work_dir: work_dir.into(),
            command_timeout,
            handle: RwLock::new(None),
            events: None,
        }
    }

    /// Broadcast sandbox lifecycle events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn work_dir(&self) -> &str {
        &self.work_dir
    }

    pub async fn is_ready(&self) -> bool {
        self.handle.read().await.is_some()
    }

    fn emit(&self, kind: EventKind, name: &str) {
        if let Some(bus) = &self.events {
            bus.emit(
                kind,
                0,
                json!({"task_id": self.task_id, "sandbox": name, "work_dir": self.work_dir}),
            );
        }
    }

    /// Create or reuse the task's sandbox. Safe to call repeatedly.
    pub async fn ensure(&self) -> Result<(), SandboxError> {
        let (handle, outcome) = self
            .manager
            .ensure(&self.task_id, &self.host_workspace, &self.work_dir)
            .await?;
        match outcome {
            EnsureOutcome::Created => self.emit(EventKind::SandboxCreated, &handle.name),
            EnsureOutcome::Started => self.emit(EventKind::SandboxStarted, &handle.name),
            EnsureOutcome::Reused => {}
        }
        *self.handle.write().await = Some(handle);
        Ok(())
    }

    async fn name(&self) -> Result<String, SandboxError> {
        self.handle
            .read()
            .await
            .as_ref()
            .map(|h| h.name.clone())
            .ok_or(SandboxError::NotInitialized)
    }

    /// Run a shell command in the task's working directory.
    ///
    /// If the backend lost the sandbox, it is recreated and the command retried once.
    pub async fn run_command(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecOutput, SandboxError> {
        let name = self.name().await?;
        let timeout = timeout.unwrap_or(self.command_timeout);
        let backend = self.manager.backend();
        match backend.exec(&name, command, &self.work_dir, timeout).await {
            Err(SandboxError::NotFound(_)) => {
                warn!(task_id = %self.task_id, sandbox = %name, "Sandbox vanished, recreating");
                self.ensure().await?;
                backend.exec(&name, command, &self.work_dir, timeout).await
            }
            other => other,
        }
    }

    pub async fn copy_to(&self, local: &Path, sandbox_path: &str) -> Result<(), SandboxError> {
        let name = self.name().await?;
        self.manager.backend().copy_to(&name, local, sandbox_path).await
    }

    pub async fn copy_from(&self, sandbox_path: &str, local: &Path) -> Result<(), SandboxError> {
        let name = self.name().await?;
        self.manager.backend().copy_from(&name, sandbox_path, local).await
    }

    pub async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        let name = self.name().await?;
        self.manager.backend().read_file(&name, path).await
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        let name = self.name().await?;
        self.manager.backend().write_file(&name, path, content).await
    }

    /// Tear down the sandbox. A second call is a no-op; after a failed
    /// call the sandbox is still tracked and a retry removes it.
    pub async fn cleanup(&self) -> Result<(), SandboxError> {
        let mut slot = self.handle.write().await;
        let Some(handle) = slot.clone() else {
            return Ok(());
        };
        let removed = self.manager.remove(&self.task_id).await?;
        *slot = None;
        if removed {
            self.emit(EventKind::SandboxRemoved, &handle.name);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
