//! Shared test doubles: a scripted reasoning collaborator and a ready
//! in-memory sandbox.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use taskpilot_core::config::SandboxConfig;
use taskpilot_core::types::{LlmResponse, Message, ToolChoice, ToolDefinition};
use taskpilot_providers::{LlmError, LlmProvider};
use taskpilot_sandbox::memory::InMemoryBackend;
use taskpilot_sandbox::{SandboxClient, SandboxManager};

/// Returns scripted responses in order, then `"(no more responses)"`.
#[derive(Default)]
pub struct MockProvider {
    responses: Mutex<Vec<Result<LlmResponse, LlmError>>>,
    plain: Mutex<Vec<String>>,
    /// `(messages, tool choice)` of every `ask_tool` call.
    pub calls: Mutex<Vec<(Vec<Message>, ToolChoice)>>,
    /// Tool names advertised on the last `ask_tool` call.
    pub advertised: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Default::default()
        }
    }

    /// Script the answers of plain `ask` calls.
    pub fn with_plain(self, answers: Vec<&str>) -> Self {
        *self.plain.lock().unwrap() = answers.into_iter().map(String::from).collect();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn ask(&self, _messages: &[Message], _system: &[Message]) -> Result<String, LlmError> {
        let mut plain = self.plain.lock().unwrap();
        if plain.is_empty() {
            Ok("(no more responses)".into())
        } else {
            Ok(plain.remove(0))
        }
    }

    async fn ask_tool(
        &self,
        messages: &[Message],
        _system: &[Message],
        tools: &[ToolDefinition],
        choice: ToolChoice,
    ) -> Result<LlmResponse, LlmError> {
        self.calls.lock().unwrap().push((messages.to_vec(), choice));
        *self.advertised.lock().unwrap() =
            tools.iter().map(|t| t.function.name.clone()).collect();
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(LlmResponse::text("(no more responses)"))
        } else {
            responses.remove(0)
        }
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn display_name(&self) -> &str {
        "MockProvider"
    }
}

/// A sandbox client for task `t1` whose sandbox already exists.
pub async fn ready_sandbox(
    backend: InMemoryBackend,
) -> (Arc<SandboxClient>, Arc<InMemoryBackend>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(backend);
    let manager = Arc::new(SandboxManager::new(backend.clone(), SandboxConfig::default()));
    let client = Arc::new(SandboxClient::new(manager, "t1", dir.path(), "/workspace"));
    client.ensure().await.unwrap();
    (client, backend, dir)
}
