//! `taskpilot status` — show configuration, sandbox and provider status.

use anyhow::Result;
use colored::Colorize;

use taskpilot_core::config::{get_config_path, load_config, TransportKind};
use taskpilot_core::utils::expand_home;
use taskpilot_agent::tools::BUILTIN_TOOLS;

fn mark(ok: bool, missing: &str) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        missing.red().to_string()
    }
}

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "Taskpilot Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        mark(config_path.exists(), "(not found)")
    );

    let workspace = expand_home(&config.sandbox.host_workspace_root);
    println!(
        "  {:<18} {} {}",
        "Workspace:".bold(),
        workspace.display(),
        mark(workspace.exists(), "(not found)")
    );

    // Reasoning collaborator
    println!();
    println!(
        "  {:<18} {} {}",
        "Model:".bold(),
        config.llm.model,
        mark(config.llm.is_configured(), "(no API key)")
    );
    println!(
        "  {:<18} {}",
        "Endpoint:".bold(),
        config.llm.api_base.as_deref().unwrap_or("(default)").dimmed()
    );
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.llm.temperature).dimmed(),
        format!("{}", config.llm.max_tokens).dimmed(),
    );

    // Agent
    println!();
    println!(
        "  {:<18} max_steps: {} | max_observe: {} | plan: {}",
        "Agent:".bold(),
        config.agent.max_steps,
        config.agent.max_observe,
        config.agent.should_plan
    );
    println!(
        "  {:<18} {} ({} mem, {} cpu, network {})",
        "Sandbox:".bold(),
        config.sandbox.image,
        config.sandbox.memory_limit,
        config.sandbox.cpu_limit,
        if config.sandbox.network_enabled { "on" } else { "off" }
    );
    println!("  {:<18} {}", "Built-in tools:".bold(), BUILTIN_TOOLS.join(", "));

    // Remote providers
    println!();
    println!("  {}", "Tool providers:".bold());
    if config.tool_providers.is_empty() {
        println!("    {}", "· none configured".dimmed());
    }
    for provider in &config.tool_providers {
        let target = match provider.transport() {
            TransportKind::Subprocess => format!("subprocess: {}", provider.command),
            TransportKind::Stream => format!("stream: {}", provider.url),
        };
        println!("    {:<20} {}", provider.label(), target.dimmed());
    }

    println!();
    Ok(())
}
