//! Shared CLI helpers — banner, event and summary printing.

use colored::Colorize;
use serde_json::Value;

use taskpilot_core::bus::{Event, EventKind};
use taskpilot_core::utils::truncate_string;

/// Longest payload excerpt shown per event line.
const EXCERPT_LEN: usize = 160;

pub fn print_banner(task_id: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "Taskpilot".cyan().bold(), version.dimmed());
    println!("{} {}", "task:".dimmed(), task_id);
    println!();
}

/// One line per event: `[step] name  excerpt`.
pub fn print_event(event: &Event) {
    let name = match event.kind {
        EventKind::ActError | EventKind::ProviderFailed => event.name().red().to_string(),
        EventKind::LifecycleComplete | EventKind::Terminated => event.name().green().to_string(),
        EventKind::ToolSelected | EventKind::ToolExecuteComplete => {
            event.name().yellow().to_string()
        }
        _ => event.name().dimmed().to_string(),
    };
    let excerpt = excerpt(event);
    if excerpt.is_empty() {
        println!("[{:>2}] {name}", event.step);
    } else {
        println!("[{:>2}] {name}  {excerpt}", event.step);
    }
}

/// The most telling payload field of an event, shortened.
fn excerpt(event: &Event) -> String {
    let field = match event.kind {
        EventKind::ToolSelected => "thoughts",
        EventKind::ToolExecuteStart => "name",
        EventKind::ToolExecuteComplete => "result",
        EventKind::StepComplete => "result",
        EventKind::PlanComplete => "plan",
        EventKind::StateChange => "to",
        EventKind::ActError | EventKind::ProviderFailed => "error",
        EventKind::SandboxCreated | EventKind::SandboxStarted | EventKind::SandboxRemoved => {
            "sandbox"
        }
        EventKind::ProviderConnected | EventKind::ProviderClosed => "provider",
        _ => return String::new(),
    };
    match event.payload.get(field) {
        Some(Value::String(s)) => truncate_string(&s.replace('\n', " "), EXCERPT_LEN),
        Some(Value::Null) | None => String::new(),
        Some(other) => truncate_string(&other.to_string(), EXCERPT_LEN),
    }
}

pub fn print_summary(summary: &str) {
    println!();
    println!("{}", "Summary".cyan().bold());
    if summary.is_empty() {
        println!("{}", "(no steps)".dimmed());
    } else {
        println!("{summary}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_excerpt_picks_field_and_flattens() {
        let e = Event::new(EventKind::StepComplete, 2, json!({"result": "line one\nline two"}));
        assert_eq!(excerpt(&e), "line one line two");
    }

    #[test]
    fn test_excerpt_empty_for_plain_events() {
        let e = Event::new(EventKind::StepStart, 1, json!({"max_steps": 3}));
        assert!(excerpt(&e).is_empty());
        let e = Event::new(EventKind::ActError, 1, json!({"error": null}));
        assert!(excerpt(&e).is_empty());
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(1000);
        let e = Event::new(EventKind::ToolExecuteComplete, 1, json!({"result": long}));
        assert!(excerpt(&e).chars().count() <= EXCERPT_LEN + 3);
    }
}
