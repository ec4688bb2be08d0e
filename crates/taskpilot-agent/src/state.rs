//! Agent state machine and the control block shared between the runner,
//! the dispatcher, and external handles.
//!
//! `IDLE → RUNNING → {FINISHED, ERROR, TERMINATED}`. Terminal states never
//! change again; `RUNNING → RUNNING` is allowed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tracing::{debug, info};

use taskpilot_core::bus::{EventBus, EventKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentState {
    Idle,
    Running,
    Finished,
    Error,
    Terminated,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentState::Finished | AgentState::Error | AgentState::Terminated
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
            AgentState::Terminated => "TERMINATED",
        }
    }

    /// Whether `self → to` is a legal move.
    pub fn can_transition_to(&self, to: AgentState) -> bool {
        match (self, to) {
            (s, _) if s.is_terminal() => false,
            (AgentState::Idle, AgentState::Idle) => false,
            (_, AgentState::Idle) => false,
            _ => true,
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// AgentControl
// ─────────────────────────────────────────────

/// State, current step, and the event bus of one agent.
pub struct AgentControl {
    state: Mutex<AgentState>,
    step: AtomicU32,
    bus: Arc<EventBus>,
}

impl AgentControl {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            state: Mutex::new(AgentState::Idle),
            step: AtomicU32::new(0),
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn step(&self) -> u32 {
        self.step.load(Ordering::Acquire)
    }

    pub fn set_step(&self, step: u32) {
        self.step.store(step, Ordering::Release);
    }

    /// Emit an event stamped with the current step.
    pub fn emit(&self, kind: EventKind, payload: Value) {
        self.bus.emit(kind, self.step(), payload);
    }

    /// Move to `to` if legal. Returns `false` (and changes nothing) otherwise.
    pub fn transition(&self, to: AgentState) -> bool {
        let from = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let current = *state;
            if !current.can_transition_to(to) {
                debug!(from = %current, to = %to, "state transition rejected");
                return false;
            }
            *state = to;
            current
        };
        if from != to {
            info!(from = %from, to = %to, "agent state changed");
            self.emit(
                EventKind::StateChange,
                json!({"from": from.as_str(), "to": to.as_str()}),
            );
        }
        true
    }

    /// Mark the run finished unless it already ended.
    pub fn finish(&self) -> bool {
        self.transition(AgentState::Finished)
    }

    /// Cooperative termination; the step loop observes it at its next boundary.
    pub fn terminate(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        self.emit(EventKind::Terminating, json!({}));
        let moved = self.transition(AgentState::Terminated);
        if moved {
            self.emit(EventKind::Terminated, json!({}));
        }
        moved
    }
}
