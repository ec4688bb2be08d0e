//! Event bus — typed lifecycle events, synchronous fan-out, and per-task
//! bounded delivery queues for streaming consumers.

pub mod queue;
pub mod types;

pub use queue::{event_queue, EventBus, EventReceiver, EventSender, StreamFrame, SubscriptionId};
pub use types::{Event, EventFamily, EventFilter, EventKind};
