//! Event types — every lifecycle event the runtime can broadcast.
//!
//! Event names are hierarchical and colon-separated (`agent:lifecycle:step:start`).
//! Subscriptions are typed: a single [`EventKind`], a whole [`EventFamily`]
//! (all kinds whose name sits under the family prefix), or everything.

use chrono::{DateTime, Utc};
use serde_json::Value;

// ─────────────────────────────────────────────
// Event kinds
// ─────────────────────────────────────────────

/// A concrete event kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    LifecycleStart,
    PrepareStart,
    PrepareComplete,
    PlanStart,
    PlanComplete,
    StepStart,
    StepComplete,
    /// The collaborator picked tools (payload: thought + tool calls).
    ToolSelected,
    ActStart,
    ActComplete,
    ActError,
    ToolExecuteStart,
    ToolExecuteComplete,
    StateChange,
    Terminating,
    Terminated,
    LifecycleComplete,
    SandboxCreated,
    SandboxStarted,
    SandboxRemoved,
    ProviderConnected,
    ProviderFailed,
    ProviderClosed,
}

impl EventKind {
    pub const ALL: [EventKind; 23] = [
        EventKind::LifecycleStart,
        EventKind::PrepareStart,
        EventKind::PrepareComplete,
        EventKind::PlanStart,
        EventKind::PlanComplete,
        EventKind::StepStart,
        EventKind::StepComplete,
        EventKind::ToolSelected,
        EventKind::ActStart,
        EventKind::ActComplete,
        EventKind::ActError,
        EventKind::ToolExecuteStart,
        EventKind::ToolExecuteComplete,
        EventKind::StateChange,
        EventKind::Terminating,
        EventKind::Terminated,
        EventKind::LifecycleComplete,
        EventKind::SandboxCreated,
        EventKind::SandboxStarted,
        EventKind::SandboxRemoved,
        EventKind::ProviderConnected,
        EventKind::ProviderFailed,
        EventKind::ProviderClosed,
    ];

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::LifecycleStart => "agent:lifecycle:start",
            EventKind::PrepareStart => "agent:lifecycle:prepare:start",
            EventKind::PrepareComplete => "agent:lifecycle:prepare:complete",
            EventKind::PlanStart => "agent:lifecycle:plan:start",
            EventKind::PlanComplete => "agent:lifecycle:plan:complete",
            EventKind::StepStart => "agent:lifecycle:step:start",
            EventKind::StepComplete => "agent:lifecycle:step:complete",
            EventKind::ToolSelected => "agent:lifecycle:step:think:tool:selected",
            EventKind::ActStart => "agent:lifecycle:step:act:tool:start",
            EventKind::ActComplete => "agent:lifecycle:step:act:tool:complete",
            EventKind::ActError => "agent:lifecycle:step:act:tool:error",
            EventKind::ToolExecuteStart => "agent:lifecycle:step:act:tool:execute:start",
            EventKind::ToolExecuteComplete => "agent:lifecycle:step:act:tool:execute:complete",
            EventKind::StateChange => "agent:lifecycle:state:change",
            EventKind::Terminating => "agent:lifecycle:terminating",
            EventKind::Terminated => "agent:lifecycle:terminated",
            EventKind::LifecycleComplete => "agent:lifecycle:complete",
            EventKind::SandboxCreated => "sandbox:lifecycle:created",
            EventKind::SandboxStarted => "sandbox:lifecycle:started",
            EventKind::SandboxRemoved => "sandbox:lifecycle:removed",
            EventKind::ProviderConnected => "tool:provider:connected",
            EventKind::ProviderFailed => "tool:provider:failed",
            EventKind::ProviderClosed => "tool:provider:closed",
        }
    }

    /// Look up a kind by its wire name.
    pub fn from_name(name: &str) -> Option<EventKind> {
        EventKind::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────
// Families (prefix groups)
// ─────────────────────────────────────────────

/// A group of event kinds sharing a name prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventFamily {
    /// `agent:lifecycle:*` — every agent event.
    Lifecycle,
    /// `agent:lifecycle:step:*`
    Step,
    /// `agent:lifecycle:step:think:*`
    Think,
    /// `agent:lifecycle:step:act:*`
    Act,
    /// `sandbox:lifecycle:*`
    Sandbox,
    /// `tool:provider:*`
    ToolProvider,
}

impl EventFamily {
    const ALL: [EventFamily; 6] = [
        EventFamily::Lifecycle,
        EventFamily::Step,
        EventFamily::Think,
        EventFamily::Act,
        EventFamily::Sandbox,
        EventFamily::ToolProvider,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            EventFamily::Lifecycle => "agent:lifecycle",
            EventFamily::Step => "agent:lifecycle:step",
            EventFamily::Think => "agent:lifecycle:step:think",
            EventFamily::Act => "agent:lifecycle:step:act",
            EventFamily::Sandbox => "sandbox:lifecycle",
            EventFamily::ToolProvider => "tool:provider",
        }
    }

    /// Whether `kind` sits under this family's prefix.
    pub fn contains(&self, kind: EventKind) -> bool {
        kind.name()
            .strip_prefix(self.prefix())
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

// ─────────────────────────────────────────────
// Filters
// ─────────────────────────────────────────────

/// Subscription key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    Kind(EventKind),
    Family(EventFamily),
}

impl EventFilter {
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kind(k) => *k == kind,
            EventFilter::Family(f) => f.contains(kind),
        }
    }

    /// Parse a textual pattern: `*`, an exact event name, or a family prefix
    /// followed by `:*` (e.g. `agent:lifecycle:*`).
    ///
    /// Returns `None` for names and prefixes that no kind or family uses.
    pub fn from_pattern(pattern: &str) -> Option<EventFilter> {
        if pattern == "*" {
            return Some(EventFilter::All);
        }
        if let Some(prefix) = pattern.strip_suffix(":*") {
            return EventFamily::ALL
                .iter()
                .copied()
                .find(|f| f.prefix() == prefix)
                .map(EventFilter::Family);
        }
        EventKind::from_name(pattern).map(EventFilter::Kind)
    }
}

impl From<EventKind> for EventFilter {
    fn from(kind: EventKind) -> Self {
        EventFilter::Kind(kind)
    }
}

impl From<EventFamily> for EventFilter {
    fn from(family: EventFamily) -> Self {
        EventFilter::Family(family)
    }
}

// ─────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────

/// A single broadcast event.
#[derive(Clone, Debug)]
pub struct Event {
    pub kind: EventKind,
    /// Step index at emission time (0 before the first step).
    pub step: u32,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, step: u32, payload: Value) -> Self {
        Event {
            kind,
            step,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// JSON shape handed to streaming consumers.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "name": self.kind.name(),
            "step": self.step,
            "payload": self.payload,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}
