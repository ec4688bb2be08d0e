//! Event fan-out and per-task delivery queues.
//!
//! - [`EventBus`] is synchronous and in-process: `emit` calls every matching
//!   handler before returning. Handlers must stay cheap.
//! - [`event_queue`] builds a bounded tokio mpsc pair used to bridge a task's
//!   events to one streaming consumer. The producer side never blocks; the
//!   consumer side polls with a bounded wait and yields heartbeats on timeout.
//!   The final event of a stream has its own slot and is never dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::types::{Event, EventFilter, EventKind};

/// Handler invoked for each matching event.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// ─────────────────────────────────────────────
// EventBus
// ─────────────────────────────────────────────

/// Typed publish/subscribe hub.
///
/// The subscription table is keyed by [`EventFilter`]; within one filter,
/// handlers run in subscription order.
#[derive(Default)]
pub struct EventBus {
    table: RwLock<HashMap<EventFilter, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every event matching `filter`.
    pub fn subscribe<F>(&self, filter: impl Into<EventFilter>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table
            .entry(filter.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for handlers in table.values_mut() {
            let before = handlers.len();
            handlers.retain(|(sid, _)| *sid != id);
            removed |= handlers.len() != before;
        }
        table.retain(|_, handlers| !handlers.is_empty());
        removed
    }

    /// Broadcast an event to every matching subscriber.
    ///
    /// Handlers are collected under the read lock and called after it is
    /// released, so a handler may itself subscribe or emit.
    pub fn emit(&self, kind: EventKind, step: u32, payload: Value) {
        let event = Event::new(kind, step, payload);
        let handlers: Vec<Handler> = {
            let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
            table
                .iter()
                .filter(|(filter, _)| filter.matches(kind))
                .flat_map(|(_, hs)| hs.iter().map(|(_, h)| h.clone()))
                .collect()
        };
        debug!(event = kind.name(), step, subscribers = handlers.len(), "emit");
        for handler in handlers {
            handler(&event);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.values().map(Vec::len).sum()
    }
}

// ─────────────────────────────────────────────
// Per-task delivery queue
// ─────────────────────────────────────────────

/// State shared by both halves of a queue.
#[derive(Default)]
struct QueueState {
    /// The consumer is gone.
    closed: AtomicBool,
    /// The final event was published; later events are refused.
    sealed: AtomicBool,
    /// Final event, kept outside the bounded channel so it is never dropped.
    last: Mutex<Option<Event>>,
    wake: Notify,
}

impl QueueState {
    fn has_last(&self) -> bool {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn take_last(&self) -> Option<Event> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Build a bounded event queue with the given capacity and heartbeat interval.
pub fn event_queue(capacity: usize, heartbeat: Duration) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let state = Arc::new(QueueState::default());
    (
        EventSender {
            tx,
            state: state.clone(),
        },
        EventReceiver {
            rx,
            heartbeat,
            state,
        },
    )
}

/// Producer half. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    state: Arc<QueueState>,
}

impl EventSender {
    /// Push an event without waiting.
    ///
    /// Returns `false` once the consumer is gone or the final event has been
    /// published. A full queue drops the event with a warning and still
    /// returns `true`.
    pub fn try_publish(&self, event: Event) -> bool {
        if self.is_closed() || self.state.sealed.load(Ordering::Acquire) {
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event = event.name(), "Event queue full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.state.closed.store(true, Ordering::Release);
                false
            }
        }
    }

    /// Publish the last event of the stream.
    ///
    /// It bypasses the bounded channel, so a full queue cannot drop it, and
    /// is delivered after everything queued before it. Later events are
    /// refused. Returns `false` if the consumer is gone or the stream was
    /// already sealed.
    pub fn publish_final(&self, event: Event) -> bool {
        if self.is_closed() || self.state.sealed.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.state.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(event);
        self.state.wake.notify_one();
        true
    }

    /// Whether the consumer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }
}

/// One item yielded to a streaming consumer.
#[derive(Clone, Debug)]
pub enum StreamFrame {
    Event(Event),
    Heartbeat,
}

impl StreamFrame {
    /// Server-sent-events rendering (`data: {...}` or `:heartbeat`).
    pub fn to_sse(&self) -> String {
        match self {
            StreamFrame::Event(e) => format!("data: {}\n\n", e.to_json()),
            StreamFrame::Heartbeat => ":heartbeat\n\n".to_string(),
        }
    }
}

/// Consumer half. Dropping it closes the queue for producers.
pub struct EventReceiver {
    rx: mpsc::Receiver<Event>,
    heartbeat: Duration,
    state: Arc<QueueState>,
}

impl EventReceiver {
    /// Wait up to the heartbeat interval for the next event.
    ///
    /// Queued events come first, then the final event. Returns `None` once
    /// every sender is dropped and both are drained.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        match tokio::time::timeout(self.heartbeat, self.next_event()).await {
            Ok(Some(event)) => Some(StreamFrame::Event(event)),
            Ok(None) => None,
            Err(_) => Some(StreamFrame::Heartbeat),
        }
    }

    async fn next_event(&mut self) -> Option<Event> {
        loop {
            // Checked before draining: everything sent ahead of the final
            // event is in the channel by the time it is visible here.
            let sealed = self.state.has_last();
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(mpsc::error::TryRecvError::Disconnected) => return self.state.take_last(),
                Err(mpsc::error::TryRecvError::Empty) if sealed => return self.state.take_last(),
                Err(mpsc::error::TryRecvError::Empty) => {}
            }
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => return Some(event),
                    None => return self.state.take_last(),
                },
                _ = self.state.wake.notified() => {}
            }
        }
    }

    /// Stop accepting events. Already-queued events can still be received.
    pub fn close(&mut self) {
        self.state.closed.store(true, Ordering::Release);
        self.rx.close();
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::Release);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
