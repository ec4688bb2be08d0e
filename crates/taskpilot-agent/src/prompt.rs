//! Prompt templates for the system message, the planning turn, and the
//! per-step nudge.

use taskpilot_core::utils::task_local_id;

use crate::tools::ToolRegistry;

const DEFAULT_LANGUAGE: &str = "English";

/// System prompt appended to memory when the agent is prepared.
pub fn system_prompt(task_id: &str, language: Option<&str>, max_steps: u32, now: &str) -> String {
    let task = task_local_id(task_id);
    let language = language.unwrap_or(DEFAULT_LANGUAGE);
    format!(
        "You are Taskpilot, an autonomous assistant that completes tasks independently \
with minimal user interaction.

Task information:
- Task ID: {task}
- Global workspace: /workspace
- Task workspace: /workspace/{task} (default working directory)
- Language: {language}
- Max steps: {max_steps} (reflects expected solution complexity)
- Current time: {now} (UTC)

Guidelines:
1. Work autonomously; never wait for confirmation.
2. Use the {max_steps} steps wisely; fewer steps means a simpler solution is expected.
3. Act through the available tools instead of describing what could be done.
4. Every command starts in /workspace/{task}; `cd` does not persist between commands.
5. Never use sudo or modify system settings; install packages in user space only.
6. Keep every file you produce inside /workspace/{task}.
7. Check how recent any information is against the current time before relying on it.
8. When the task is complete, summarize your work and call `terminate`."
    )
}

/// Planning-phase prompt listing every registered tool as `- name: description`.
pub fn plan_prompt(language: Option<&str>, max_steps: u32, registry: &ToolRegistry) -> String {
    let language = language.unwrap_or(DEFAULT_LANGUAGE);
    let tools = registry
        .iter()
        .map(|t| format!("- {}: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are Taskpilot, specialized in problem analysis and solution planning.
Always answer in {language}.

This is a PLANNING PHASE ONLY. Do not execute tools, change files, or invent data.
Produce a plan the execution phase can follow within {max_steps} steps:
1. Break the problem into components and name the constraints.
2. Order the steps and state what each one produces.
3. Name the tool each step will use.
4. Say how the result will be checked.

Available tools:
{tools}"
    )
}

/// Per-step prompt. Sent with the request, never stored in memory.
pub fn next_step_prompt(current_step: u32, max_steps: u32) -> String {
    let remaining = max_steps.saturating_sub(current_step);
    format!(
        "Determine the best next action and execute it immediately.

Current progress: step {current_step}/{max_steps}
Remaining: {remaining} steps

Scale detail to the remaining budget: with 3 or fewer steps left, focus on the core result. \
Use the tools directly. If the task is complete, summarize and call `terminate`."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{builtin_tool, TerminateTool};
    use std::sync::Arc;

    #[test]
    fn test_system_prompt_strips_organization() {
        let prompt = system_prompt("acme/report-7", None, 12, "2026-01-02 03:04:05");
        assert!(prompt.contains("Task ID: report-7"));
        assert!(prompt.contains("/workspace/report-7"));
        assert!(!prompt.contains("acme"));
        assert!(prompt.contains("Language: English"));
        assert!(prompt.contains("Max steps: 12"));
    }

    #[test]
    fn test_plan_prompt_lists_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(builtin_tool("bash").unwrap()).unwrap();
        registry.register(Arc::new(TerminateTool)).unwrap();

        let prompt = plan_prompt(Some("French"), 5, &registry);
        assert!(prompt.contains("Always answer in French."));
        assert!(prompt.contains("- bash: Execute a bash command"));
        assert!(prompt.contains("- terminate: Terminate the interaction"));
    }

    #[test]
    fn test_next_step_prompt_counts() {
        let prompt = next_step_prompt(3, 10);
        assert!(prompt.contains("step 3/10"));
        assert!(prompt.contains("Remaining: 7 steps"));
        assert!(next_step_prompt(12, 10).contains("Remaining: 0 steps"));
    }
}
