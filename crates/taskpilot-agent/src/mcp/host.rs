//! Tool Host — connects remote tool providers and merges their catalogs
//! into the agent's [`ToolRegistry`].
//!
//! Providers are independent: one that fails to connect is reported and
//! skipped, the others and all local tools stay usable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use taskpilot_core::bus::EventKind;
use taskpilot_core::config::{ToolProviderConfig, TransportKind};

use super::client::McpClient;
use super::error::McpError;
use super::protocol::RemoteToolSpec;
use super::sse::SseTransport;
use super::stdio::StdioTransport;
use crate::error::RegistryError;
use crate::state::AgentControl;
use crate::tools::{Tool, ToolError, ToolRegistry, ToolResult};

/// Default wait for connect, handshake and each remote call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderState {
    Connecting,
    Ready,
    Closed,
}

struct ProviderEntry {
    label: String,
    transport: TransportKind,
    client: Arc<McpClient>,
    tools: Vec<String>,
    state: ProviderState,
}

pub struct ToolHost {
    providers: Vec<ProviderEntry>,
    timeout: Duration,
}

impl Default for ToolHost {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_TIMEOUT)
    }
}

impl ToolHost {
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            timeout,
        }
    }

    /// Open the transport described by `config` and complete the handshake.
    pub async fn connect(&self, config: &ToolProviderConfig) -> Result<McpClient, McpError> {
        let label = config.label();
        info!(provider = label, state = ?ProviderState::Connecting, "connecting tool provider");
        match config.transport() {
            TransportKind::Subprocess => {
                if config.command.trim().is_empty() {
                    return Err(McpError::Spawn {
                        command: String::new(),
                        reason: "provider has neither a url nor a command".into(),
                    });
                }
                let (transport, inbound) =
                    StdioTransport::spawn(label, &config.command, &config.args, &config.env)?;
                McpClient::connect(label, Box::new(transport), inbound, self.timeout).await
            }
            TransportKind::Stream => {
                let (transport, inbound) =
                    SseTransport::connect(label, &config.url, &config.headers, self.timeout).await?;
                McpClient::connect(label, Box::new(transport), inbound, self.timeout).await
            }
        }
    }

    /// Connect a provider and register its tools. Returns how many were registered.
    pub async fn add_provider(
        &mut self,
        registry: &mut ToolRegistry,
        config: &ToolProviderConfig,
        control: &AgentControl,
    ) -> Result<usize, McpError> {
        let client = match self.connect(config).await {
            Ok(client) => client,
            Err(e) => {
                warn!(provider = config.label(), error = %e, "tool provider failed to connect");
                control.emit(
                    EventKind::ProviderFailed,
                    json!({"provider": config.label(), "error": e.to_string()}),
                );
                return Err(e);
            }
        };
        self.add_client(registry, client, config.transport(), control).await
    }

    /// Register the catalog of an already-connected provider.
    pub async fn add_client(
        &mut self,
        registry: &mut ToolRegistry,
        client: McpClient,
        transport: TransportKind,
        control: &AgentControl,
    ) -> Result<usize, McpError> {
        let label = client.label().to_string();
        let specs = match client.list_tools().await {
            Ok(specs) => specs,
            Err(e) => {
                warn!(provider = %label, error = %e, "tool provider catalog unavailable");
                if let Err(close_err) = client.close().await {
                    warn!(provider = %label, error = %close_err, "close after failure failed");
                }
                control.emit(
                    EventKind::ProviderFailed,
                    json!({"provider": label, "error": e.to_string()}),
                );
                return Err(e);
            }
        };

        let client = Arc::new(client);
        let mut registered = Vec::new();
        for spec in specs {
            let name = spec.name.clone();
            match registry.register(Arc::new(RemoteTool::new(spec, client.clone()))) {
                Ok(()) => registered.push(name),
                Err(RegistryError::DuplicateTool(name)) => {
                    warn!(provider = %label, tool = %name, "remote tool collides with a registered tool, skipping");
                }
            }
        }

        info!(provider = %label, tools = registered.len(), "tool provider connected");
        control.emit(
            EventKind::ProviderConnected,
            json!({
                "provider": label,
                "transport": match transport {
                    TransportKind::Subprocess => "subprocess",
                    TransportKind::Stream => "stream",
                },
                "tools": registered,
            }),
        );

        let count = registered.len();
        self.providers.push(ProviderEntry {
            label,
            transport,
            client,
            tools: registered,
            state: ProviderState::Ready,
        });
        Ok(count)
    }

    /// `(label, state, registered tool names)` per provider, in connect order.
    pub fn providers(&self) -> Vec<(String, ProviderState, Vec<String>)> {
        self.providers
            .iter()
            .map(|p| (p.label.clone(), p.state, p.tools.clone()))
            .collect()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Close every live provider; individual close failures are logged only.
    pub async fn cleanup(&mut self, control: &AgentControl) {
        for provider in self.providers.iter_mut() {
            if provider.state == ProviderState::Closed {
                continue;
            }
            let ok = match provider.client.close().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(provider = %provider.label, transport = ?provider.transport, error = %e, "tool provider close failed");
                    false
                }
            };
            provider.state = ProviderState::Closed;
            control.emit(
                EventKind::ProviderClosed,
                json!({"provider": provider.label, "clean": ok}),
            );
        }
    }
}

// ─────────────────────────────────────────────
// RemoteTool
// ─────────────────────────────────────────────

/// A provider-advertised tool, registered under its own name.
pub struct RemoteTool {
    spec: RemoteToolSpec,
    description: String,
    client: Arc<McpClient>,
}

impl RemoteTool {
    pub fn new(spec: RemoteToolSpec, client: Arc<McpClient>) -> Self {
        let description = spec.description.clone().unwrap_or_default();
        Self {
            spec,
            description,
            client,
        }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.spec.input_schema.clone()
    }

    async fn execute(&self, params: HashMap<String, Value>) -> Result<ToolResult, ToolError> {
        info!(tool = %self.spec.name, provider = %self.client.label(), "calling remote tool");
        let arguments = Value::Object(params.into_iter().collect());
        self.client
            .call_tool(&self.spec.name, arguments)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))
    }
}
