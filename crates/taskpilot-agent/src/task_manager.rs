//! Task Manager — the table of tasks, each with its own agent, event bus and
//! single-consumer event stream.
//!
//! Tasks run as independent tokio tasks. The only state they share is the
//! [`SandboxManager`] handed in at construction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taskpilot_core::bus::{
    event_queue, Event, EventBus, EventFilter, EventKind, EventReceiver, StreamFrame,
    SubscriptionId,
};
use taskpilot_core::config::{EventsConfig, ToolProviderConfig};
use taskpilot_core::types::Message;
use taskpilot_core::utils::task_local_id;
use taskpilot_providers::LlmProvider;
use taskpilot_sandbox::{SandboxClient, SandboxManager, SANDBOX_WORKSPACE};

use crate::error::{AgentError, TaskError};
use crate::runner::{Agent, AgentHandle, AgentSettings, ToolSpec};
use crate::state::AgentState;
use crate::tools::BUILTIN_TOOLS;

// ─────────────────────────────────────────────
// TaskInfo
// ─────────────────────────────────────────────

/// Snapshot of one task for listings.
#[derive(Clone, Debug)]
pub struct TaskInfo {
    pub id: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub state: AgentState,
    pub step: u32,
}

struct TaskEntry {
    prompt: String,
    created_at: DateTime<Utc>,
    seq: u64,
    bus: Arc<EventBus>,
    bridge: SubscriptionId,
    handle: AgentHandle,
    agent: Option<Agent>,
    receiver: Option<EventReceiver>,
    join: Option<JoinHandle<Result<String, AgentError>>>,
}

impl TaskEntry {
    fn info(&self, id: &str) -> TaskInfo {
        TaskInfo {
            id: id.to_string(),
            prompt: self.prompt.clone(),
            created_at: self.created_at,
            state: self.handle.state(),
            step: self.handle.step(),
        }
    }

    /// Stop the agent and disconnect the stream bridge.
    fn shut_down(&self) {
        self.handle.terminate();
        self.bus.unsubscribe(self.bridge);
    }
}

// ─────────────────────────────────────────────
// TaskEvents
// ─────────────────────────────────────────────

/// The event stream of one task.
///
/// Yields events in emission order, heartbeats while idle, and ends right
/// after the lifecycle-complete event.
pub struct TaskEvents {
    receiver: EventReceiver,
    done: bool,
}

impl TaskEvents {
    pub async fn next(&mut self) -> Option<StreamFrame> {
        if self.done {
            return None;
        }
        let frame = self.receiver.next_frame().await;
        match &frame {
            Some(StreamFrame::Event(e)) if e.kind == EventKind::LifecycleComplete => {
                self.done = true;
                self.receiver.close();
            }
            None => self.done = true,
            _ => {}
        }
        frame
    }
}

// ─────────────────────────────────────────────
// TaskManager
// ─────────────────────────────────────────────

pub struct TaskManager {
    llm: Arc<dyn LlmProvider>,
    settings: AgentSettings,
    providers: Vec<ToolProviderConfig>,
    sandboxes: Option<(Arc<SandboxManager>, PathBuf)>,
    queue_capacity: usize,
    heartbeat: Duration,
    tasks: RwLock<HashMap<String, TaskEntry>>,
    next_seq: std::sync::atomic::AtomicU64,
}

impl TaskManager {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: AgentSettings) -> Self {
        let events = EventsConfig::default();
        Self {
            llm,
            settings,
            providers: Vec::new(),
            sandboxes: None,
            queue_capacity: events.queue_capacity,
            heartbeat: Duration::from_secs(events.heartbeat_secs),
            tasks: RwLock::new(HashMap::new()),
            next_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Give every task a sandbox under `host_workspace_root`.
    pub fn with_sandboxes(mut self, manager: Arc<SandboxManager>, host_workspace_root: PathBuf) -> Self {
        self.sandboxes = Some((manager, host_workspace_root));
        self
    }

    /// Remote providers connected for every task in addition to its own tools.
    pub fn with_providers(mut self, providers: Vec<ToolProviderConfig>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_event_queue(mut self, capacity: usize, heartbeat: Duration) -> Self {
        self.queue_capacity = capacity;
        self.heartbeat = heartbeat;
        self
    }

    /// Register a task. An existing task with the same id is terminated,
    /// awaited and replaced.
    pub async fn create_task(
        &self,
        task_id: &str,
        prompt: &str,
        tools: Vec<ToolSpec>,
        history: Vec<Message>,
    ) -> AgentHandle {
        // Take the old entry out first; its run is awaited without holding
        // the table lock.
        let previous = self.tasks.write().await.remove(task_id);
        if let Some(previous) = previous {
            info!(task_id, "replacing existing task");
            previous.shut_down();
            if let Some(join) = previous.join {
                if let Err(e) = join.await {
                    warn!(task_id, error = %e, "previous run ended abnormally");
                }
            }
        }

        let bus = Arc::new(EventBus::new());
        let (sender, receiver) = event_queue(self.queue_capacity, self.heartbeat);
        let bridge = bus.subscribe(EventFilter::All, move |event: &Event| {
            if event.kind == EventKind::LifecycleComplete {
                sender.publish_final(event.clone());
            } else {
                sender.try_publish(event.clone());
            }
        });

        let mut agent = Agent::new(task_id, self.llm.clone(), bus.clone())
            .with_settings(self.settings.clone())
            .with_tools(self.tool_list(tools))
            .with_history(history);
        if let Some((manager, root)) = &self.sandboxes {
            let work_dir = format!("{SANDBOX_WORKSPACE}/{}", task_local_id(task_id));
            let client = SandboxClient::new(manager.clone(), task_id, root.clone(), work_dir)
                .with_events(bus.clone());
            agent = agent.with_sandbox(Arc::new(client));
        }

        let handle = agent.handle();
        let entry = TaskEntry {
            prompt: prompt.to_string(),
            created_at: Utc::now(),
            seq: self.next_seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            bus,
            bridge,
            handle: handle.clone(),
            agent: Some(agent),
            receiver: Some(receiver),
            join: None,
        };
        self.tasks.write().await.insert(task_id.to_string(), entry);
        debug!(task_id, "task created");
        handle
    }

    fn tool_list(&self, tools: Vec<ToolSpec>) -> Vec<ToolSpec> {
        if self.providers.is_empty() {
            return tools;
        }
        let mut tools = if tools.is_empty() {
            BUILTIN_TOOLS.iter().map(|n| ToolSpec::Local(n.to_string())).collect()
        } else {
            tools
        };
        tools.extend(self.providers.iter().cloned().map(ToolSpec::Remote));
        tools
    }

    /// Start the task's run in the background.
    pub async fn spawn(&self, task_id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        let mut agent = entry
            .agent
            .take()
            .ok_or_else(|| TaskError::AlreadyStarted(task_id.to_string()))?;

        let prompt = entry.prompt.clone();
        let bus = entry.bus.clone();
        let bridge = entry.bridge;
        let id = task_id.to_string();
        entry.join = Some(tokio::spawn(async move {
            let outcome = agent.run(&prompt).await;
            match &outcome {
                Ok(_) => info!(task_id = %id, state = %agent.state(), "task finished"),
                Err(AgentError::InvalidState(state)) => {
                    // The run never started; close the stream anyway.
                    warn!(task_id = %id, state = %state, "task not started");
                    bus.emit(
                        EventKind::LifecycleComplete,
                        0,
                        json!({"state": state.as_str(), "steps": 0, "error": "not started"}),
                    );
                }
                Err(e) => warn!(task_id = %id, error = %e, "task failed"),
            }
            // Drops the stream's sender so the consumer drains and ends.
            bus.unsubscribe(bridge);
            outcome
        }));
        Ok(())
    }

    /// Take the task's event stream. Only one consumer per task.
    pub async fn events(&self, task_id: &str) -> Result<TaskEvents, TaskError> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        let receiver = entry
            .receiver
            .take()
            .ok_or_else(|| TaskError::StreamTaken(task_id.to_string()))?;
        Ok(TaskEvents {
            receiver,
            done: false,
        })
    }

    /// Wait for a spawned task's run to end and return its step summary.
    pub async fn wait(&self, task_id: &str) -> Result<String, TaskError> {
        let join = {
            let mut tasks = self.tasks.write().await;
            let entry = tasks
                .get_mut(task_id)
                .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
            entry.join.take()
        };
        let Some(join) = join else {
            return Err(TaskError::NotFound(task_id.to_string()));
        };
        match join.await {
            Ok(outcome) => Ok(outcome?),
            Err(_) => Err(TaskError::Aborted(task_id.to_string())),
        }
    }

    pub async fn terminate_task(&self, task_id: &str) -> Result<bool, TaskError> {
        let tasks = self.tasks.read().await;
        let entry = tasks
            .get(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        info!(task_id, "terminating task");
        Ok(entry.handle.terminate())
    }

    /// Drop a task from the table, terminating it if still running.
    pub async fn remove_task(&self, task_id: &str) -> bool {
        match self.tasks.write().await.remove(task_id) {
            Some(entry) => {
                entry.shut_down();
                debug!(task_id, "task removed");
                true
            }
            None => false,
        }
    }

    pub async fn get_task(&self, task_id: &str) -> Option<TaskInfo> {
        self.tasks.read().await.get(task_id).map(|e| e.info(task_id))
    }

    /// Every task, newest first.
    pub async fn list_tasks(&self) -> Vec<TaskInfo> {
        let tasks = self.tasks.read().await;
        let mut entries: Vec<_> = tasks.iter().collect();
        entries.sort_by(|(_, a), (_, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        entries.into_iter().map(|(id, e)| e.info(id)).collect()
    }
}
