//! Taskpilot CLI — entry point.
//!
//! # Commands
//!
//! - `taskpilot run -p PROMPT [--task-id ID] [--max-steps N] [--plan] [--tool T]... [--logs]`
//!   — run one task and print its event stream
//! - `taskpilot status` — show configuration, sandbox and provider status

mod helpers;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use taskpilot_agent::{AgentSettings, TaskManager, ToolSpec};
use taskpilot_core::bus::StreamFrame;
use taskpilot_core::config::{load_config, Config};
use taskpilot_core::utils::expand_home;
use taskpilot_providers::HttpProvider;
use taskpilot_sandbox::{DockerCli, SandboxManager};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Taskpilot — autonomous task runner with sandboxed tools
#[derive(Parser)]
#[command(name = "taskpilot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task to completion and stream its events
    Run {
        /// Task request
        #[arg(short, long)]
        prompt: String,

        /// Task identifier, `organization/task` allowed (random when omitted)
        #[arg(long)]
        task_id: Option<String>,

        /// Step budget (overrides config)
        #[arg(long)]
        max_steps: Option<u32>,

        /// Run a planning turn before the first step
        #[arg(long, default_value_t = false)]
        plan: bool,

        /// Built-in tool name, or a JSON remote provider descriptor (repeatable)
        #[arg(long = "tool")]
        tools: Vec<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration and provider status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            prompt,
            task_id,
            max_steps,
            plan,
            tools,
            logs,
        } => {
            init_logging(logs);
            let task_id = task_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
            run_task(&prompt, &task_id, max_steps, plan, tools).await
        }
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Run command
// ─────────────────────────────────────────────

async fn run_task(
    prompt: &str,
    task_id: &str,
    max_steps: Option<u32>,
    plan: bool,
    tools: Vec<String>,
) -> Result<()> {
    let config = load_config(None);
    let manager = build_task_manager(&config, max_steps, plan)?;
    let tools: Vec<ToolSpec> = tools.iter().map(|t| ToolSpec::parse(t)).collect();

    manager.create_task(task_id, prompt, tools, Vec::new()).await;
    let mut events = manager.events(task_id).await?;
    manager.spawn(task_id).await?;
    info!(task_id, "task started");
    helpers::print_banner(task_id);

    loop {
        tokio::select! {
            frame = events.next() => match frame {
                Some(StreamFrame::Event(event)) => helpers::print_event(&event),
                Some(StreamFrame::Heartbeat) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!(task_id, "interrupted, terminating task");
                manager.terminate_task(task_id).await?;
            }
        }
    }

    let summary = manager
        .wait(task_id)
        .await
        .with_context(|| format!("task {task_id} failed"))?;
    helpers::print_summary(&summary);
    Ok(())
}

/// Build a `TaskManager` from the loaded configuration.
fn build_task_manager(config: &Config, max_steps: Option<u32>, plan: bool) -> Result<TaskManager> {
    if !config.llm.is_configured() {
        anyhow::bail!("no API key configured; set llm.apiKey or TASKPILOT_LLM__API_KEY");
    }
    let provider = HttpProvider::new(&config.llm).context("failed to create LLM provider")?;

    let mut settings = AgentSettings::from(&config.agent);
    if let Some(n) = max_steps {
        settings.max_steps = n;
    }
    settings.should_plan |= plan;

    let workspace = expand_home(&config.sandbox.host_workspace_root);
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("failed to create workspace: {}", workspace.display()))?;
    let sandboxes = Arc::new(SandboxManager::new(
        Arc::new(DockerCli::new()),
        config.sandbox.clone(),
    ));

    Ok(TaskManager::new(Arc::new(provider), settings)
        .with_sandboxes(sandboxes, workspace)
        .with_providers(config.tool_providers.clone())
        .with_event_queue(
            config.events.queue_capacity,
            std::time::Duration::from_secs(config.events.heartbeat_secs),
        ))
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("taskpilot=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
