//! Agent Runner — the top-level step loop.
//!
//! `prepare → plan (optional) → think/act × max_steps → cleanup`. The runner
//! owns memory, the tool registry and the remote tool host of one task; its
//! state lives in a shared [`AgentControl`] so an [`AgentHandle`] can
//! terminate a run from another task.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use taskpilot_core::bus::{EventBus, EventKind};
use taskpilot_core::config::{AgentConfig, ToolProviderConfig};
use taskpilot_core::types::{Message, ToolChoice};
use taskpilot_providers::LlmProvider;
use taskpilot_sandbox::SandboxClient;

use crate::dispatcher::{StepContext, ToolDispatcher};
use crate::error::{AgentError, RegistryError};
use crate::mcp::ToolHost;
use crate::memory::Memory;
use crate::prompt::{next_step_prompt, plan_prompt, system_prompt};
use crate::state::{AgentControl, AgentState};
use crate::tools::{
    builtin_tool, TerminateTool, Tool, ToolDeps, ToolRegistry, BUILTIN_TOOLS, TERMINATE_TOOL_NAME,
};

/// Observation of a step whose think phase chose not to act.
pub const NO_ACTION: &str = "Thinking complete - no action needed";

// ─────────────────────────────────────────────
// Settings and tool selection
// ─────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub max_steps: u32,
    pub max_observe: usize,
    pub should_plan: bool,
    pub language: Option<String>,
    pub tool_timeout: Option<Duration>,
    pub tool_choice: ToolChoice,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for AgentSettings {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            max_steps: cfg.max_steps,
            max_observe: cfg.max_observe,
            should_plan: cfg.should_plan,
            language: cfg.language.clone(),
            tool_timeout: cfg.tool_timeout_secs.map(Duration::from_secs),
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// One entry of the tool list handed to an agent.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolSpec {
    /// A built-in tool, by name.
    Local(String),
    /// A remote provider whose whole catalog is registered.
    Remote(ToolProviderConfig),
}

impl ToolSpec {
    /// A JSON object is a provider descriptor; anything else names a built-in.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value @ serde_json::Value::Object(_)) => {
                match serde_json::from_value::<ToolProviderConfig>(value) {
                    Ok(cfg) => ToolSpec::Remote(cfg),
                    Err(_) => ToolSpec::Local(raw.trim().to_string()),
                }
            }
            _ => ToolSpec::Local(raw.trim().to_string()),
        }
    }
}

// ─────────────────────────────────────────────
// AgentHandle
// ─────────────────────────────────────────────

/// Cloneable remote control for a running agent.
#[derive(Clone)]
pub struct AgentHandle {
    control: Arc<AgentControl>,
}

impl AgentHandle {
    pub fn state(&self) -> AgentState {
        self.control.state()
    }

    pub fn step(&self) -> u32 {
        self.control.step()
    }

    /// Ask the run to stop; observed at the next step boundary.
    pub fn terminate(&self) -> bool {
        self.control.terminate()
    }
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

pub struct Agent {
    task_id: String,
    settings: AgentSettings,
    llm: Arc<dyn LlmProvider>,
    control: Arc<AgentControl>,
    memory: Memory,
    history: Vec<Message>,
    tools: Vec<ToolSpec>,
    extra_tools: Vec<Arc<dyn Tool>>,
    registry: ToolRegistry,
    host: ToolHost,
    dispatcher: ToolDispatcher,
    sandbox: Option<Arc<SandboxClient>>,
    system_prompt: String,
    prepared: bool,
    cleaned: bool,
}

impl Agent {
    pub fn new(task_id: impl Into<String>, llm: Arc<dyn LlmProvider>, bus: Arc<EventBus>) -> Self {
        Self {
            task_id: task_id.into(),
            settings: AgentSettings::default(),
            llm,
            control: Arc::new(AgentControl::new(bus)),
            memory: Memory::new(),
            history: Vec::new(),
            tools: Vec::new(),
            extra_tools: Vec::new(),
            registry: ToolRegistry::new(),
            host: ToolHost::default(),
            dispatcher: ToolDispatcher::new(),
            sandbox: None,
            system_prompt: String::new(),
            prepared: false,
            cleaned: false,
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Tools to register during prepare. Empty means every built-in.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Register an already-constructed tool alongside the listed ones.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    pub fn with_sandbox(mut self, sandbox: Arc<SandboxClient>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Prior conversation appended to memory before the run's prompt.
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_tool_host(mut self, host: ToolHost) -> Self {
        self.host = host;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            control: self.control.clone(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.control.state()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    // ─────────────────────────────────────────
    // prepare
    // ─────────────────────────────────────────

    /// Build the registry, connect remote providers and create the sandbox.
    pub async fn prepare(&mut self) -> Result<(), AgentError> {
        if self.prepared {
            return Ok(());
        }
        self.prepared = true;
        self.control.emit(EventKind::PrepareStart, json!({"task_id": self.task_id}));

        self.system_prompt = system_prompt(
            &self.task_id,
            self.settings.language.as_deref(),
            self.settings.max_steps,
            &chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        self.memory.push(Message::system(self.system_prompt.clone()));
        self.memory.extend(std::mem::take(&mut self.history));

        self.dispatcher = ToolDispatcher::new()
            .with_choice(self.settings.tool_choice)
            .with_max_observe(self.settings.max_observe)
            .with_tool_timeout(self.settings.tool_timeout);
        self.registry = ToolRegistry::with_deps(ToolDeps {
            sandbox: self.sandbox.clone(),
            llm: Some(self.llm.clone()),
        });
        self.register_tools().await;

        let needs_sandbox = self.registry.iter().any(|t| t.as_sandbox_aware().is_some());
        if let Some(sandbox) = self.sandbox.as_ref().filter(|_| needs_sandbox) {
            if let Err(e) = sandbox.ensure().await {
                error!(task_id = %self.task_id, error = %e, "sandbox creation failed");
                return Err(e.into());
            }
        }

        info!(
            task_id = %self.task_id,
            tools = self.registry.len(),
            providers = self.host.provider_count(),
            "agent prepared"
        );
        self.control.emit(
            EventKind::PrepareComplete,
            json!({"tools": self.registry.tool_names()}),
        );
        Ok(())
    }

    async fn register_tools(&mut self) {
        let specs = if self.tools.is_empty() {
            BUILTIN_TOOLS.iter().map(|n| ToolSpec::Local(n.to_string())).collect()
        } else {
            self.tools.clone()
        };

        for tool in std::mem::take(&mut self.extra_tools) {
            self.register(tool);
        }
        for spec in &specs {
            match spec {
                ToolSpec::Local(name) => match builtin_tool(name) {
                    Some(tool) => self.register(tool),
                    None => warn!(tool = %name, "unknown built-in tool, skipping"),
                },
                ToolSpec::Remote(cfg) => {
                    match self
                        .host
                        .add_provider(&mut self.registry, cfg, &self.control)
                        .await
                    {
                        Ok(count) => debug!(provider = cfg.label(), tools = count, "remote tools added"),
                        Err(e) => debug!(provider = cfg.label(), error = %e, "remote tool spec skipped"),
                    }
                }
            }
        }
        if !self.registry.has(TERMINATE_TOOL_NAME) {
            self.register(Arc::new(TerminateTool));
        }
    }

    fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Err(RegistryError::DuplicateTool(name)) = self.registry.register(tool) {
            debug!(tool = %name, "tool listed twice");
        }
    }

    // ─────────────────────────────────────────
    // plan
    // ─────────────────────────────────────────

    /// One planning turn; the plan joins memory as a user message.
    pub async fn plan(&mut self, request: &str) {
        self.control.emit(EventKind::PlanStart, json!({"request": request}));
        let prompt = plan_prompt(
            self.settings.language.as_deref(),
            self.settings.max_steps,
            &self.registry,
        );
        let messages = [Message::system(prompt), Message::user(request)];
        let system = [Message::system(self.system_prompt.clone())];

        match self.llm.ask(&messages, &system).await {
            Ok(plan) => {
                info!(task_id = %self.task_id, chars = plan.len(), "plan created");
                self.memory.push(Message::user(plan.clone()));
                self.control.emit(EventKind::PlanComplete, json!({"plan": plan}));
            }
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "planning failed, continuing without a plan");
                self.control.emit(
                    EventKind::PlanComplete,
                    json!({"plan": null, "error": e.to_string()}),
                );
            }
        }
    }

    // ─────────────────────────────────────────
    // run
    // ─────────────────────────────────────────

    /// Run the task to a terminal state. Returns one `Step i: ...` line per step.
    pub async fn run(&mut self, prompt: &str) -> Result<String, AgentError> {
        let state = self.control.state();
        if state != AgentState::Idle {
            return Err(AgentError::InvalidState(state));
        }

        info!(task_id = %self.task_id, max_steps = self.settings.max_steps, "agent run started");
        self.control.emit(
            EventKind::LifecycleStart,
            json!({"prompt": prompt, "max_steps": self.settings.max_steps}),
        );

        let outcome = self.run_steps(prompt).await;
        if let Err(e) = &outcome {
            error!(task_id = %self.task_id, error = %e, "agent run failed");
            self.control.transition(AgentState::Error);
        }

        self.control.emit(
            EventKind::LifecycleComplete,
            json!({
                "state": self.control.state().as_str(),
                "steps": self.control.step(),
                "error": outcome.as_ref().err().map(|e| e.to_string()),
            }),
        );
        self.cleanup().await;
        outcome
    }

    async fn run_steps(&mut self, prompt: &str) -> Result<String, AgentError> {
        self.prepare().await?;
        self.memory.push(Message::user(prompt));
        if !self.control.transition(AgentState::Running) {
            // terminated between construction and start
            return Ok(String::new());
        }
        if self.settings.should_plan {
            self.plan(prompt).await;
        }

        let max_steps = self.settings.max_steps;
        let mut results = Vec::new();
        for step in 1..=max_steps {
            if self.control.state().is_terminal() {
                break;
            }
            self.control.set_step(step);
            info!(task_id = %self.task_id, step, max_steps, "executing step");
            self.control.emit(EventKind::StepStart, json!({"max_steps": max_steps}));

            let result = self.step().await?;

            self.control.emit(EventKind::StepComplete, json!({"result": result}));
            results.push(format!("Step {step}: {result}"));
        }

        if !self.control.state().is_terminal() {
            info!(task_id = %self.task_id, max_steps, "step budget exhausted");
            results.push(format!("Terminated: Reached max steps ({max_steps})"));
            self.control.finish();
        }
        Ok(results.join("\n"))
    }

    /// One think/act cycle.
    pub async fn step(&mut self) -> Result<String, AgentError> {
        let ctx = StepContext {
            next_step_prompt: Some(next_step_prompt(self.control.step(), self.settings.max_steps)),
        };
        let should_act = self
            .dispatcher
            .ask(
                &mut self.memory,
                &self.registry,
                self.llm.as_ref(),
                &self.control,
                &[],
                &ctx,
            )
            .await?;
        if !should_act {
            return Ok(NO_ACTION.to_string());
        }
        Ok(self
            .dispatcher
            .execute(&mut self.memory, &self.registry, &self.control)
            .await?)
    }

    // ─────────────────────────────────────────
    // cleanup
    // ─────────────────────────────────────────

    /// Release tools, remote providers and the sandbox. Runs once.
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        self.registry.cleanup().await;
        self.host.cleanup(&self.control).await;
        if let Some(sandbox) = &self.sandbox {
            if let Err(e) = sandbox.cleanup().await {
                warn!(task_id = %self.task_id, error = %e, "sandbox cleanup failed");
            }
        }
        debug!(task_id = %self.task_id, "agent cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ready_sandbox, MockProvider};
    use crate::tools::{ToolError, ToolResult};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use taskpilot_core::bus::{Event, EventFilter};
    use taskpilot_core::types::{LlmResponse, Role, ToolCall};
    use taskpilot_sandbox::memory::InMemoryBackend;
    use taskpilot_sandbox::ExecOutput;

    struct ListFiles;

    #[async_trait]
    impl Tool for ListFiles {
        fn name(&self) -> &str {
            "list_files"
        }
        fn description(&self) -> &str {
            "List files"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::success("a.txt\nb.txt"))
        }
    }

    fn recorded_bus() -> (Arc<EventBus>, Arc<Mutex<Vec<Event>>>) {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(EventFilter::All, move |e: &Event| sink.lock().unwrap().push(e.clone()));
        (bus, seen)
    }

    fn settings(max_steps: u32) -> AgentSettings {
        AgentSettings {
            max_steps,
            ..Default::default()
        }
    }

    fn call(id: &str, name: &str, args: &str) -> LlmResponse {
        LlmResponse::with_tool_calls(None, vec![ToolCall::new(id, name, args)])
    }

    #[tokio::test]
    async fn test_list_files_end_to_end() {
        let (bus, _) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![call("c1", "list_files", "{}")]));
        let mut agent = Agent::new("t1", llm, bus)
            .with_settings(settings(1))
            .with_tools(vec![ToolSpec::Local("create_chat_completion".into())])
            .with_tool(Arc::new(ListFiles));

        agent.run("list files").await.unwrap();

        let messages = agent.memory().messages();
        let n = messages.len();
        assert_eq!(messages[n - 2].role(), Role::Assistant);
        assert_eq!(messages[n - 2].tool_calls()[0].name(), "list_files");
        assert_eq!(messages[n - 1].role(), Role::Tool);
        assert_eq!(
            messages[n - 1].content(),
            Some("Observed output of cmd `list_files` executed:\na.txt\nb.txt")
        );
    }

    #[tokio::test]
    async fn test_terminate_ends_run_early() {
        let (bus, _) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![
            call("c1", "list_files", "{}"),
            call("c2", "terminate", r#"{"status": "success"}"#),
        ]));
        let mut agent = Agent::new("t1", llm.clone(), bus)
            .with_settings(settings(10))
            .with_tools(vec![ToolSpec::Local("terminate".into())])
            .with_tool(Arc::new(ListFiles));

        let summary = agent.run("go").await.unwrap();
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(llm.call_count(), 2);
        assert!(summary.starts_with("Step 1: Observed output of cmd `list_files`"));
        assert!(summary.contains("Step 2: "));
        assert!(!summary.contains("Reached max steps"));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_reported() {
        let (bus, _) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![]));
        let mut agent = Agent::new("t1", llm, bus)
            .with_settings(settings(2))
            .with_tools(vec![ToolSpec::Local("terminate".into())]);

        let summary = agent.run("go").await.unwrap();
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "Terminated: Reached max steps (2)");
        assert_eq!(agent.state(), AgentState::Finished);
    }

    #[tokio::test]
    async fn test_lifecycle_events_bracket_the_run() {
        let (bus, seen) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![call("c1", "terminate", r#"{"status": "success"}"#)]));
        let mut agent = Agent::new("t1", llm, bus).with_settings(settings(3)).with_tools(vec![
            ToolSpec::Local("terminate".into()),
        ]);
        agent.run("go").await.unwrap();

        let kinds: Vec<_> = seen.lock().unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds.first(), Some(&EventKind::LifecycleStart));
        assert_eq!(kinds.last(), Some(&EventKind::LifecycleComplete));
        let pos = |k| kinds.iter().position(|x| *x == k).unwrap();
        assert!(pos(EventKind::PrepareStart) < pos(EventKind::PrepareComplete));
        assert!(pos(EventKind::PrepareComplete) < pos(EventKind::StepStart));
        assert!(pos(EventKind::StepStart) < pos(EventKind::ToolSelected));
        assert!(pos(EventKind::ActComplete) < pos(EventKind::StepComplete));
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::StepStart).count(), 1);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let (bus, _) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![]));
        let mut agent = Agent::new("t1", llm, bus).with_settings(settings(1));
        agent.run("first").await.unwrap();
        assert!(matches!(
            agent.run("second").await,
            Err(AgentError::InvalidState(AgentState::Finished))
        ));
    }

    #[tokio::test]
    async fn test_invalid_request_moves_to_error() {
        let (bus, seen) = recorded_bus();
        let llm = Arc::new(MockProvider::scripted(vec![Err(
            taskpilot_providers::LlmError::InvalidRequest("orphan tool message".into()),
        )]));
        let mut agent = Agent::new("t1", llm, bus).with_settings(settings(3));

        assert!(agent.run("go").await.is_err());
        assert_eq!(agent.state(), AgentState::Error);
        let last = seen.lock().unwrap().last().map(|e| e.kind);
        assert_eq!(last, Some(EventKind::LifecycleComplete));
    }

    #[tokio::test]
    async fn test_terminate_from_handle_stops_at_boundary() {
        /// Terminates its own agent, then reports success.
        struct StopMe(Mutex<Option<AgentHandle>>);

        #[async_trait]
        impl Tool for StopMe {
            fn name(&self) -> &str {
                "stop_me"
            }
            fn description(&self) -> &str {
                "stops"
            }
            fn parameters(&self) -> Value {
                json!({"type": "object"})
            }
            async fn execute(&self, _: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
                if let Some(handle) = self.0.lock().unwrap().as_ref() {
                    handle.terminate();
                }
                Ok(ToolResult::success("stopping"))
            }
        }

        let (bus, _) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![
            call("c1", "stop_me", "{}"),
            call("c2", "stop_me", "{}"),
        ]));
        let tool = Arc::new(StopMe(Mutex::new(None)));
        let mut agent = Agent::new("t1", llm.clone(), bus)
            .with_settings(settings(5))
            .with_tool(tool.clone());
        *tool.0.lock().unwrap() = Some(agent.handle());

        agent.run("go").await.unwrap();
        assert_eq!(agent.state(), AgentState::Terminated);
        assert_eq!(llm.call_count(), 1);
        // the in-flight step still recorded its observation
        assert_eq!(agent.memory().last().map(|m| m.role()), Some(Role::Tool));
    }

    #[tokio::test]
    async fn test_history_and_plan_precede_prompt() {
        let (bus, seen) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![]).with_plain(vec!["1. look around"]));
        let mut agent = Agent::new("acme/t1", llm, bus)
            .with_settings(AgentSettings {
                max_steps: 1,
                should_plan: true,
                ..Default::default()
            })
            .with_history(vec![Message::user("earlier"), Message::assistant("reply")]);

        agent.run("now").await.unwrap();
        let contents: Vec<_> = agent
            .memory()
            .messages()
            .iter()
            .take(5)
            .map(|m| m.content().unwrap_or_default().to_string())
            .collect();
        assert!(contents[0].contains("Task ID: t1"));
        assert_eq!(&contents[1..5], &["earlier", "reply", "now", "1. look around"]);
        assert!(seen.lock().unwrap().iter().any(|e| e.kind == EventKind::PlanComplete
            && e.payload["plan"] == "1. look around"));
    }

    #[tokio::test]
    async fn test_sandbox_created_for_sandbox_tools_and_removed_after() {
        let backend = InMemoryBackend::new().with_exec_handler(|_| ExecOutput {
            stdout: "a.txt\nb.txt\n".into(),
            ..Default::default()
        });
        let (sandbox, backend, _dir) = ready_sandbox(backend).await;
        sandbox.cleanup().await.unwrap();
        assert_eq!(backend.container_count(), 0);

        let (bus, _) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![call("c1", "list_dir", r#"{"path": "."}"#)]));
        let mut agent = Agent::new("t1", llm, bus)
            .with_settings(settings(1))
            .with_tools(vec![ToolSpec::Local("list_dir".into())])
            .with_sandbox(sandbox);

        agent.prepare().await.unwrap();
        assert_eq!(backend.container_count(), 1);

        agent.run("ls").await.unwrap();
        let observation = agent
            .memory()
            .by_role(Role::Tool)
            .next()
            .and_then(|m| m.content())
            .unwrap()
            .to_string();
        assert_eq!(observation, "Observed output of cmd `list_dir` executed:\na.txt\nb.txt");
        assert_eq!(backend.container_count(), 0);
    }

    #[tokio::test]
    async fn test_tools_are_advertised_and_terminate_always_present() {
        let (bus, _) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![]));
        let mut agent = Agent::new("t1", llm.clone(), bus)
            .with_settings(settings(1))
            .with_tools(vec![
                ToolSpec::Local("create_chat_completion".into()),
                ToolSpec::Local("browser".into()),
            ]);
        agent.run("go").await.unwrap();
        assert_eq!(
            *llm.advertised.lock().unwrap(),
            vec!["create_chat_completion", "terminate"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_skipped() {
        let (bus, seen) = recorded_bus();
        let llm = Arc::new(MockProvider::new(vec![]));
        let broken = ToolProviderConfig {
            name: "broken".into(),
            command: "/nonexistent/taskpilot-provider".into(),
            ..Default::default()
        };
        let mut agent = Agent::new("t1", llm.clone(), bus)
            .with_settings(settings(1))
            .with_tools(vec![
                ToolSpec::Remote(broken),
                ToolSpec::Local("create_chat_completion".into()),
            ]);

        agent.run("go").await.unwrap();

        assert_eq!(
            *llm.advertised.lock().unwrap(),
            vec!["create_chat_completion", "terminate"]
        );
        let seen = seen.lock().unwrap();
        let failed = seen
            .iter()
            .find(|e| e.kind == EventKind::ProviderFailed)
            .unwrap();
        assert_eq!(failed.payload["provider"], "broken");
    }

    #[test]
    fn test_tool_spec_parse() {
        assert_eq!(ToolSpec::parse("bash"), ToolSpec::Local("bash".into()));
        match ToolSpec::parse(r#"{"name": "search", "url": "http://localhost:9000/sse"}"#) {
            ToolSpec::Remote(cfg) => {
                assert_eq!(cfg.name, "search");
                assert_eq!(cfg.url, "http://localhost:9000/sse");
            }
            other => panic!("expected remote provider, got {other:?}"),
        }
    }
}
