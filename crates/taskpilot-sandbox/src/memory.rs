//! In-memory backend for tests. Containers are table entries, files are a
//! path → content map, and `exec` answers through a scripted handler.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::SandboxBackend;
use crate::error::SandboxError;
use crate::spec::{ContainerStatus, ExecOutput, SandboxSpec};

type ExecHandler = Arc<dyn Fn(&str) -> ExecOutput + Send + Sync>;

#[derive(Debug, Clone)]
struct FakeContainer {
    status: ContainerStatus,
    work_dir: String,
    files: HashMap<String, String>,
}

pub struct InMemoryBackend {
    containers: Mutex<HashMap<String, FakeContainer>>,
    handler: ExecHandler,
    create_delay: Duration,
    creates: AtomicUsize,
    starts: AtomicUsize,
    failing_removes: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
            handler: Arc::new(|cmd: &str| ExecOutput {
                stdout: cmd.to_string(),
                ..Default::default()
            }),
            create_delay: Duration::ZERO,
            creates: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            failing_removes: AtomicUsize::new(0),
        }
    }
}

impl InMemoryBackend {
    /// Echoes each command back as its stdout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exec_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> ExecOutput + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Make `create` slow enough to expose check-then-create races.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Fail the next `n` calls to `remove`, leaving the container in place.
    pub fn with_failing_removes(self, n: usize) -> Self {
        self.failing_removes.store(n, Ordering::SeqCst);
        self
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn container_count(&self) -> usize {
        self.lock().len()
    }

    /// Simulate a container that exited on its own.
    pub fn stop(&self, name: &str) {
        if let Some(c) = self.lock().get_mut(name) {
            c.status = ContainerStatus::Stopped;
        }
    }

    /// Simulate a container removed behind the manager's back.
    pub fn evict(&self, name: &str) {
        self.lock().remove(name);
    }

    pub fn work_dir(&self, name: &str) -> Option<String> {
        self.lock().get(name).map(|c| c.work_dir.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FakeContainer>> {
        self.containers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_container<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut FakeContainer) -> Result<T, SandboxError>,
    ) -> Result<T, SandboxError> {
        let mut table = self.lock();
        let container = table
            .get_mut(name)
            .ok_or_else(|| SandboxError::NotFound(name.to_string()))?;
        f(container)
    }
}

#[async_trait]
impl SandboxBackend for InMemoryBackend {
    async fn status(&self, name: &str) -> Result<ContainerStatus, SandboxError> {
        Ok(self
            .lock()
            .get(name)
            .map(|c| c.status)
            .unwrap_or(ContainerStatus::Absent))
    }

    async fn create(&self, spec: &SandboxSpec) -> Result<(), SandboxError> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        let mut table = self.lock();
        if table.contains_key(&spec.name) {
            return Err(SandboxError::Backend(format!(
                "Conflict. The container name \"{}\" is already in use",
                spec.name
            )));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        table.insert(
            spec.name.clone(),
            FakeContainer {
                status: ContainerStatus::Created,
                work_dir: spec.work_dir.clone(),
                files: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<(), SandboxError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.with_container(name, |c| {
            c.status = ContainerStatus::Running;
            Ok(())
        })
    }

    async fn exec(
        &self,
        name: &str,
        command: &str,
        _work_dir: &str,
        _timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        self.with_container(name, |c| match c.status {
            ContainerStatus::Running => Ok(()),
            _ => Err(SandboxError::Backend(format!("container {name} is not running"))),
        })?;
        Ok((self.handler)(command))
    }

    async fn copy_to(
        &self,
        name: &str,
        local: &Path,
        sandbox_path: &str,
    ) -> Result<(), SandboxError> {
        let content = tokio::fs::read_to_string(local).await?;
        self.write_file(name, sandbox_path, &content).await
    }

    async fn copy_from(
        &self,
        name: &str,
        sandbox_path: &str,
        local: &Path,
    ) -> Result<(), SandboxError> {
        let content = self.read_file(name, sandbox_path).await?;
        tokio::fs::write(local, content).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str, path: &str) -> Result<String, SandboxError> {
        self.with_container(name, |c| {
            c.files
                .get(path)
                .cloned()
                .ok_or_else(|| SandboxError::Backend(format!("cat: {path}: No such file or directory")))
        })
    }

    async fn write_file(&self, name: &str, path: &str, content: &str) -> Result<(), SandboxError> {
        self.with_container(name, |c| {
            c.files.insert(path.to_string(), content.to_string());
            Ok(())
        })
    }

    async fn remove(&self, name: &str) -> Result<(), SandboxError> {
        let failing = self
            .failing_removes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SandboxError::Backend(format!(
                "Error response from daemon: cannot remove container {name}"
            )));
        }
        self.lock().remove(name);
        Ok(())
    }
}
