//! Tool Dispatcher — the think (select tools) and act (run tools) halves of
//! one agent step.
//!
//! `ask` sends memory plus the registry's schemas to the reasoning
//! collaborator and records the selection. `execute` runs the selected calls
//! strictly in order, appending one tool message per call.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use taskpilot_core::bus::EventKind;
use taskpilot_core::types::{Message, ToolCall, ToolChoice};
use taskpilot_core::utils::{truncate_chars, truncate_string};
use taskpilot_providers::LlmProvider;

use crate::error::DispatchError;
use crate::memory::Memory;
use crate::state::AgentControl;
use crate::tools::{ToolError, ToolRegistry, ToolResult, TERMINATE_TOOL_NAME};

/// Default cap on a single observation, in characters.
pub const DEFAULT_MAX_OBSERVE: usize = 10_000;

/// Per-step values passed into `ask`; nothing here outlives the step.
#[derive(Clone, Debug, Default)]
pub struct StepContext {
    /// Sent as a trailing user message for this request only.
    pub next_step_prompt: Option<String>,
}

pub struct ToolDispatcher {
    choice: ToolChoice,
    special_tools: Vec<String>,
    max_observe: usize,
    tool_timeout: Option<Duration>,
    tool_calls: Vec<ToolCall>,
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self {
            choice: ToolChoice::Auto,
            special_tools: vec![TERMINATE_TOOL_NAME.to_string()],
            max_observe: DEFAULT_MAX_OBSERVE,
            tool_timeout: None,
            tool_calls: Vec::new(),
        }
    }
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_choice(mut self, choice: ToolChoice) -> Self {
        self.choice = choice;
        self
    }

    /// `0` disables truncation.
    pub fn with_max_observe(mut self, max_observe: usize) -> Self {
        self.max_observe = max_observe;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_special_tools(mut self, names: Vec<String>) -> Self {
        self.special_tools = names;
        self
    }

    pub fn choice(&self) -> ToolChoice {
        self.choice
    }

    /// Calls selected by the last `ask`, not yet executed.
    pub fn pending_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    fn is_special(&self, name: &str) -> bool {
        self.special_tools.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    // ─────────────────────────────────────────
    // think
    // ─────────────────────────────────────────

    /// Ask the collaborator which tools to run. Returns whether to act.
    pub async fn ask(
        &mut self,
        memory: &mut Memory,
        registry: &ToolRegistry,
        llm: &dyn LlmProvider,
        control: &AgentControl,
        system: &[Message],
        ctx: &StepContext,
    ) -> Result<bool, DispatchError> {
        let mut messages = memory.messages().to_vec();
        if let Some(prompt) = &ctx.next_step_prompt {
            messages.push(Message::user(prompt.clone()));
        }

        let definitions = registry.get_definitions();
        let response = match llm.ask_tool(&messages, system, &definitions, self.choice).await {
            Ok(response) => response,
            Err(e) if e.is_token_limit() => {
                error!(error = %e, "token limit reached");
                memory.push(Message::assistant(format!(
                    "Maximum token limit reached, cannot continue execution: {e}"
                )));
                self.tool_calls.clear();
                control.finish();
                return Ok(false);
            }
            Err(e) if e.is_invalid_request() => return Err(e.into()),
            Err(e) => {
                error!(error = %e, "thinking failed");
                memory.push(Message::assistant(format!(
                    "Error encountered while processing: {e}"
                )));
                self.tool_calls.clear();
                return Ok(false);
            }
        };

        let content = response.content.unwrap_or_default();
        let tool_calls = response.tool_calls;

        info!(step = control.step(), thoughts = %truncate_string(&content, 200), "thoughts");
        info!(step = control.step(), count = tool_calls.len(), "tools selected");
        control.emit(
            EventKind::ToolSelected,
            json!({
                "thoughts": content,
                "tool_calls": tool_calls.iter().map(call_payload).collect::<Vec<_>>(),
            }),
        );

        if self.choice == ToolChoice::None {
            if !tool_calls.is_empty() {
                warn!(count = tool_calls.len(), "tools selected while tool choice is none, discarding");
            }
            if !content.is_empty() {
                memory.push(Message::assistant(content));
            }
            self.tool_calls.clear();
            return Ok(false);
        }

        if tool_calls.is_empty() {
            memory.push(Message::assistant(content.clone()));
        } else {
            memory.push(Message::assistant_tool_calls(content.clone(), tool_calls.clone()));
        }
        self.tool_calls = tool_calls;

        Ok(match self.choice {
            ToolChoice::Required => true,
            _ if !self.tool_calls.is_empty() => true,
            _ => !content.is_empty(),
        })
    }

    // ─────────────────────────────────────────
    // act
    // ─────────────────────────────────────────

    /// Run the pending calls in order. Returns the joined observations.
    pub async fn execute(
        &mut self,
        memory: &mut Memory,
        registry: &ToolRegistry,
        control: &AgentControl,
    ) -> Result<String, DispatchError> {
        let calls = std::mem::take(&mut self.tool_calls);
        control.emit(
            EventKind::ActStart,
            json!({"tool_calls": calls.iter().map(call_payload).collect::<Vec<_>>()}),
        );

        if calls.is_empty() {
            if self.choice == ToolChoice::Required {
                return Err(DispatchError::ToolCallsRequired);
            }
            return Ok(memory
                .last()
                .and_then(|m| m.content())
                .filter(|c| !c.is_empty())
                .unwrap_or("No content or commands to execute")
                .to_string());
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            let (observation, image) = self.execute_call(call, registry, control).await;
            let observation = if self.max_observe > 0 {
                truncate_chars(&observation, self.max_observe)
            } else {
                observation
            };
            debug!(tool = %call.name(), chars = observation.len(), "observation recorded");
            memory.push(Message::tool_result(
                call.id.clone(),
                call.name(),
                observation.clone(),
                image,
            ));
            results.push(observation);
        }

        control.emit(EventKind::ActComplete, json!({"results": results}));
        Ok(results.join("\n\n"))
    }

    /// One call: `(observation text, inline image)`. Never fails.
    async fn execute_call(
        &self,
        call: &ToolCall,
        registry: &ToolRegistry,
        control: &AgentControl,
    ) -> (String, Option<String>) {
        let name = call.name();
        if name.is_empty() {
            return (self.act_error(control, call, "Invalid command format"), None);
        }
        if !registry.has(name) {
            warn!(tool = name, "unknown tool requested");
            return (
                self.act_error(control, call, &format!("Unknown tool '{name}'")),
                None,
            );
        }

        let args = match parse_arguments(&call.function.arguments) {
            Some(args) => args,
            None => {
                let msg = format!("Error parsing arguments for {name}: Invalid JSON format");
                error!(tool = name, arguments = %call.function.arguments, "invalid tool arguments");
                control.emit(
                    EventKind::ToolExecuteComplete,
                    json!({"id": call.id, "name": name, "args": call.function.arguments, "error": msg}),
                );
                return (self.act_error(control, call, &msg), None);
            }
        };
        let args_json = Value::Object(args.clone().into_iter().collect());

        info!(tool = name, "activating tool");
        control.emit(
            EventKind::ToolExecuteStart,
            json!({"id": call.id, "name": name, "args": args_json}),
        );

        let outcome = self.invoke(registry, name, args).await;

        // Special tools end the run whatever they returned.
        if self.is_special(name) {
            info!(tool = name, "special tool completed the task");
            control.finish();
        }

        match outcome {
            Ok(result) => {
                control.emit(
                    EventKind::ToolExecuteComplete,
                    json!({
                        "id": call.id,
                        "name": name,
                        "args": args_json,
                        "result": result.to_string(),
                        "error": result.error,
                    }),
                );
                let observation = if result.is_empty() {
                    format!("Cmd `{name}` completed with no output")
                } else {
                    format!("Observed output of cmd `{name}` executed:\n{result}")
                };
                (observation, result.base64_image)
            }
            Err(e) => {
                let msg = format!("⚠️ Tool '{name}' encountered a problem: {e}");
                error!(tool = name, error = %e, "tool failed");
                control.emit(
                    EventKind::ToolExecuteComplete,
                    json!({"id": call.id, "name": name, "args": args_json, "error": msg}),
                );
                (self.act_error(control, call, &msg), None)
            }
        }
    }

    async fn invoke(
        &self,
        registry: &ToolRegistry,
        name: &str,
        args: HashMap<String, Value>,
    ) -> Result<ToolResult, ToolError> {
        let Some(limit) = self.tool_timeout else {
            return registry.invoke(name, args).await;
        };
        match tokio::time::timeout(limit, registry.invoke(name, args)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(tool = name, secs = limit.as_secs(), "tool timed out");
                Ok(ToolResult::failure(format!(
                    "Tool '{name}' timed out after {}s",
                    limit.as_secs()
                )))
            }
        }
    }

    /// Emit the act-error event and render the `Error: ...` observation.
    fn act_error(&self, control: &AgentControl, call: &ToolCall, msg: &str) -> String {
        control.emit(
            EventKind::ActError,
            json!({"id": call.id, "name": call.name(), "error": msg}),
        );
        format!("Error: {msg}")
    }
}

/// Empty payload means no arguments; anything else must be a JSON object.
fn parse_arguments(raw: &str) -> Option<HashMap<String, Value>> {
    if raw.trim().is_empty() {
        return Some(HashMap::new());
    }
    match serde_json::from_str::<Value>(raw).ok()? {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}

fn call_payload(call: &ToolCall) -> Value {
    let arguments = serde_json::from_str::<Value>(&call.function.arguments)
        .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
    json!({
        "id": call.id,
        "type": call.call_type,
        "function": {"name": call.name(), "arguments": arguments},
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AgentState;
    use crate::testing::MockProvider;
    use crate::tools::{Tool, TerminateTool};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use taskpilot_core::bus::{Event, EventBus, EventFamily};
    use taskpilot_core::types::{LlmResponse, Role};
    use taskpilot_providers::LlmError;

    /// Returns a fixed result regardless of arguments.
    struct FixedTool {
        name: &'static str,
        result: Result<ToolResult, ToolError>,
        delay: Duration,
    }

    impl FixedTool {
        fn ok(name: &'static str, output: &str) -> Self {
            Self {
                name,
                result: Ok(ToolResult::success(output)),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fixed"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.result.clone()
        }
    }

    struct Fixture {
        memory: Memory,
        registry: ToolRegistry,
        control: AgentControl,
        events: Arc<Mutex<Vec<Event>>>,
    }

    fn fixture(tools: Vec<Arc<dyn Tool>>) -> Fixture {
        let bus = Arc::new(EventBus::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(EventFamily::Lifecycle, move |e: &Event| sink.lock().unwrap().push(e.clone()));
        let control = AgentControl::new(bus);
        control.transition(AgentState::Running);

        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        let mut memory = Memory::new();
        memory.push(Message::user("do the thing"));
        Fixture { memory, registry, control, events }
    }

    async fn think(
        d: &mut ToolDispatcher,
        f: &mut Fixture,
        llm: &MockProvider,
    ) -> Result<bool, DispatchError> {
        d.ask(&mut f.memory, &f.registry, llm, &f.control, &[], &StepContext::default())
            .await
    }

    async fn act(d: &mut ToolDispatcher, f: &mut Fixture) -> Result<String, DispatchError> {
        d.execute(&mut f.memory, &f.registry, &f.control).await
    }

    fn calls(specs: &[(&str, &str, &str)]) -> LlmResponse {
        LlmResponse::with_tool_calls(
            None,
            specs.iter().map(|(id, name, args)| ToolCall::new(*id, *name, *args)).collect(),
        )
    }

    fn tool_messages(memory: &Memory) -> Vec<(String, String)> {
        memory
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, content, .. } => {
                    Some((tool_call_id.clone(), content.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_n_calls_append_n_tool_messages_in_order() {
        let mut f = fixture(vec![
            Arc::new(FixedTool::ok("a", "first")),
            Arc::new(FixedTool::ok("b", "second")),
        ]);
        let llm = MockProvider::new(vec![calls(&[
            ("c1", "b", "{}"),
            ("c2", "a", "{}"),
            ("c3", "b", "{}"),
        ])]);
        let mut d = ToolDispatcher::new();

        assert!(think(&mut d, &mut f, &llm).await.unwrap());
        let joined = act(&mut d, &mut f).await.unwrap();

        let msgs = tool_messages(&f.memory);
        let ids: Vec<_> = msgs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(msgs[1].1, "Observed output of cmd `a` executed:\nfirst");
        assert_eq!(joined.split("\n\n").count(), 3);
        // one assistant message for the whole selection
        assert_eq!(f.memory.by_role(Role::Assistant).count(), 1);
        assert!(d.pending_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_observation() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::new(vec![calls(&[("c1", "nope", r#"{"x": 1}"#)])]);
        let mut d = ToolDispatcher::new();

        think(&mut d, &mut f, &llm).await.unwrap();
        let result = act(&mut d, &mut f).await.unwrap();
        assert_eq!(result, "Error: Unknown tool 'nope'");
        assert_eq!(tool_messages(&f.memory)[0].1, "Error: Unknown tool 'nope'");
    }

    #[tokio::test]
    async fn test_observation_truncated_to_max_observe() {
        let mut f = fixture(vec![Arc::new(FixedTool::ok("t", "abcdefgh"))]);
        let llm = MockProvider::new(vec![calls(&[("c1", "t", "{}")])]);
        let mut d = ToolDispatcher::new().with_max_observe(5);

        think(&mut d, &mut f, &llm).await.unwrap();
        let result = act(&mut d, &mut f).await.unwrap();
        assert!(result.chars().count() <= 5);
        assert!(tool_messages(&f.memory)[0].1.chars().count() <= 5);
    }

    #[tokio::test]
    async fn test_terminate_always_finishes() {
        for args in [r#"{"status": "success"}"#, r#"{"status": "bogus"}"#] {
            let mut f = fixture(vec![Arc::new(TerminateTool)]);
            let llm = MockProvider::new(vec![calls(&[("c1", "terminate", args)])]);
            let mut d = ToolDispatcher::new();

            think(&mut d, &mut f, &llm).await.unwrap();
            act(&mut d, &mut f).await.unwrap();
            assert_eq!(f.control.state(), AgentState::Finished, "args: {args}");
        }
    }

    #[tokio::test]
    async fn test_none_mode_never_acts() {
        let mut f = fixture(vec![Arc::new(FixedTool::ok("t", "x"))]);
        let llm = MockProvider::new(vec![calls(&[("c1", "t", "{}")])]);
        let mut d = ToolDispatcher::new().with_choice(ToolChoice::None);

        assert!(!think(&mut d, &mut f, &llm).await.unwrap());
        assert!(d.pending_calls().is_empty());
        assert_eq!(f.memory.len(), 1);
        assert!(tool_messages(&f.memory).is_empty());
    }

    #[tokio::test]
    async fn test_none_mode_keeps_text() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::new(vec![LlmResponse::text("just words")]);
        let mut d = ToolDispatcher::new().with_choice(ToolChoice::None);

        assert!(!think(&mut d, &mut f, &llm).await.unwrap());
        assert_eq!(f.memory.last().and_then(|m| m.content()), Some("just words"));
    }

    #[tokio::test]
    async fn test_required_mode_without_calls_fails_in_act() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::new(vec![LlmResponse::text("")]);
        let mut d = ToolDispatcher::new().with_choice(ToolChoice::Required);

        assert!(think(&mut d, &mut f, &llm).await.unwrap());
        let err = act(&mut d, &mut f).await.unwrap_err();
        assert!(matches!(err, DispatchError::ToolCallsRequired));
        assert_eq!(err.to_string(), "Tool calls required but none provided");
    }

    #[tokio::test]
    async fn test_auto_mode_narration() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::new(vec![LlmResponse::text("thinking aloud"), LlmResponse::text("")]);
        let mut d = ToolDispatcher::new();

        assert!(think(&mut d, &mut f, &llm).await.unwrap());
        assert_eq!(act(&mut d, &mut f).await.unwrap(), "thinking aloud");

        assert!(!think(&mut d, &mut f, &llm).await.unwrap());
        assert_eq!(
            act(&mut d, &mut f).await.unwrap(),
            "No content or commands to execute"
        );
    }

    #[tokio::test]
    async fn test_token_limit_finishes_run() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::scripted(vec![Err(LlmError::TokenLimitExceeded("too long".into()))]);
        let mut d = ToolDispatcher::new();

        assert!(!think(&mut d, &mut f, &llm).await.unwrap());
        assert_eq!(f.control.state(), AgentState::Finished);
        let last = f.memory.last().and_then(|m| m.content()).unwrap();
        assert!(last.starts_with("Maximum token limit reached, cannot continue execution: "));
    }

    #[tokio::test]
    async fn test_invalid_request_propagates() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::scripted(vec![Err(LlmError::InvalidRequest("bad".into()))]);
        let mut d = ToolDispatcher::new();

        let err = think(&mut d, &mut f, &llm).await.unwrap_err();
        assert!(matches!(err, DispatchError::Llm(LlmError::InvalidRequest(_))));
        assert_eq!(f.memory.len(), 1);
    }

    #[tokio::test]
    async fn test_other_llm_errors_recorded() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::scripted(vec![Err(LlmError::Http("connection reset".into()))]);
        let mut d = ToolDispatcher::new();

        assert!(!think(&mut d, &mut f, &llm).await.unwrap());
        assert_eq!(f.control.state(), AgentState::Running);
        let last = f.memory.last().and_then(|m| m.content()).unwrap();
        assert!(last.starts_with("Error encountered while processing: "));
    }

    #[tokio::test]
    async fn test_bad_arguments_and_tool_failure_continue() {
        let mut f = fixture(vec![
            Arc::new(FixedTool {
                name: "flaky",
                result: Err(ToolError::Execution("disk full".into())),
                delay: Duration::ZERO,
            }),
            Arc::new(FixedTool::ok("ok", "fine")),
        ]);
        let llm = MockProvider::new(vec![calls(&[
            ("c1", "ok", "{not json"),
            ("c2", "flaky", "{}"),
            ("c3", "ok", ""),
        ])]);
        let mut d = ToolDispatcher::new();

        think(&mut d, &mut f, &llm).await.unwrap();
        act(&mut d, &mut f).await.unwrap();
        let msgs = tool_messages(&f.memory);
        assert_eq!(msgs[0].1, "Error: Error parsing arguments for ok: Invalid JSON format");
        assert_eq!(msgs[1].1, "Error: ⚠️ Tool 'flaky' encountered a problem: disk full");
        assert_eq!(msgs[2].1, "Observed output of cmd `ok` executed:\nfine");
    }

    #[tokio::test]
    async fn test_empty_result_and_error_result_rendering() {
        let mut f = fixture(vec![
            Arc::new(FixedTool::ok("quiet", "")),
            Arc::new(FixedTool {
                name: "sad",
                result: Ok(ToolResult::failure("boom")),
                delay: Duration::ZERO,
            }),
        ]);
        let llm = MockProvider::new(vec![calls(&[("c1", "quiet", "{}"), ("c2", "sad", "{}")])]);
        let mut d = ToolDispatcher::new();

        think(&mut d, &mut f, &llm).await.unwrap();
        act(&mut d, &mut f).await.unwrap();
        let msgs = tool_messages(&f.memory);
        assert_eq!(msgs[0].1, "Cmd `quiet` completed with no output");
        assert_eq!(msgs[1].1, "Observed output of cmd `sad` executed:\nError: boom");
    }

    #[tokio::test]
    async fn test_tool_timeout_is_error_result() {
        let mut f = fixture(vec![Arc::new(FixedTool {
            name: "slow",
            result: Ok(ToolResult::success("late")),
            delay: Duration::from_secs(5),
        })]);
        let llm = MockProvider::new(vec![calls(&[("c1", "slow", "{}")])]);
        let mut d = ToolDispatcher::new().with_tool_timeout(Some(Duration::from_millis(20)));

        think(&mut d, &mut f, &llm).await.unwrap();
        let result = act(&mut d, &mut f).await.unwrap();
        assert!(result.contains("Error: Tool 'slow' timed out"));
    }

    #[tokio::test]
    async fn test_image_travels_with_tool_message() {
        let mut f = fixture(vec![Arc::new(FixedTool {
            name: "shot",
            result: Ok(ToolResult::success("captured").with_image("aW1n")),
            delay: Duration::ZERO,
        })]);
        let llm = MockProvider::new(vec![calls(&[("c1", "shot", "{}")])]);
        let mut d = ToolDispatcher::new();

        think(&mut d, &mut f, &llm).await.unwrap();
        act(&mut d, &mut f).await.unwrap();
        assert_eq!(f.memory.last().and_then(|m| m.base64_image()), Some("aW1n"));
    }

    #[tokio::test]
    async fn test_next_step_prompt_sent_but_not_stored() {
        let mut f = fixture(vec![]);
        let llm = MockProvider::new(vec![LlmResponse::text("ok")]);
        let mut d = ToolDispatcher::new();
        let ctx = StepContext {
            next_step_prompt: Some("step 1/3".into()),
        };

        d.ask(&mut f.memory, &f.registry, &llm, &f.control, &[], &ctx)
            .await
            .unwrap();

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls[0].0.last().and_then(|m| m.content()), Some("step 1/3"));
        assert!(f.memory.messages().iter().all(|m| m.content() != Some("step 1/3")));
    }

    #[tokio::test]
    async fn test_act_event_order() {
        let mut f = fixture(vec![Arc::new(FixedTool::ok("t", "x"))]);
        let llm = MockProvider::new(vec![calls(&[("c1", "t", "{}")])]);
        let mut d = ToolDispatcher::new();

        think(&mut d, &mut f, &llm).await.unwrap();
        act(&mut d, &mut f).await.unwrap();

        let kinds: Vec<_> = f
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.kind)
            .filter(|k| *k != EventKind::StateChange)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ToolSelected,
                EventKind::ActStart,
                EventKind::ToolExecuteStart,
                EventKind::ToolExecuteComplete,
                EventKind::ActComplete,
            ]
        );
        let events = f.events.lock().unwrap();
        let selected = events.iter().find(|e| e.kind == EventKind::ToolSelected).unwrap();
        assert_eq!(selected.payload["tool_calls"][0]["function"]["name"], "t");
    }
}
