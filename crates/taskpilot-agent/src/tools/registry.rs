//! Tool Registry — the single name-keyed dispatch namespace for local and
//! remote tools.
//!
//! Registration is additive: a name can be registered once, later attempts
//! fail with [`RegistryError::DuplicateTool`] and the first tool stays.
//! Tools are listed in registration order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use taskpilot_core::types::ToolDefinition;
use taskpilot_providers::LlmProvider;
use taskpilot_sandbox::SandboxClient;

use super::base::{Tool, ToolError, ToolResult};
use crate::error::RegistryError;

/// Dependencies injected into tools that declare the matching capability.
#[derive(Clone, Default)]
pub struct ToolDeps {
    pub sandbox: Option<Arc<SandboxClient>>,
    pub llm: Option<Arc<dyn LlmProvider>>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    deps: ToolDeps,
}

impl ToolRegistry {
    /// Create an empty registry with no injectable dependencies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that injects `deps` into capable tools.
    pub fn with_deps(deps: ToolDeps) -> Self {
        Self {
            deps,
            ..Default::default()
        }
    }

    /// Register a tool, injecting the dependencies it asks for.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            warn!(tool = %name, "tool name already registered");
            return Err(RegistryError::DuplicateTool(name));
        }

        if let (Some(aware), Some(sandbox)) = (tool.as_sandbox_aware(), &self.deps.sandbox) {
            aware.attach_sandbox(sandbox.clone());
        }
        if let (Some(aware), Some(llm)) = (tool.as_reasoning_aware(), &self.deps.llm) {
            aware.attach_llm(llm.clone());
        }

        info!(tool = %name, "registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Definitions advertised to the collaborator, in registration order.
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Iterate tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    /// Invoke a tool by name.
    ///
    /// An unregistered name yields a failed `ToolResult`; the tool's own
    /// declared errors are passed through for the caller to render.
    pub async fn invoke(
        &self,
        name: &str,
        params: HashMap<String, Value>,
    ) -> Result<ToolResult, ToolError> {
        match self.get(name) {
            Some(tool) => tool.execute(params).await,
            None => {
                warn!(tool = name, "tool not found");
                Ok(ToolResult::failure(format!("Tool {name} is invalid")))
            }
        }
    }

    /// Run every tool's cleanup hook; failures are logged and skipped.
    pub async fn cleanup(&self) {
        for tool in &self.tools {
            if let Err(e) = tool.cleanup().await {
                warn!(tool = tool.name(), error = %e, "tool cleanup failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
