//! Transport contract shared by the subprocess and stream providers.
//!
//! A transport sends outbound JSON-RPC frames through [`Transport::send`];
//! inbound frames arrive on the [`Inbound`] receiver returned when it was
//! opened. The receiver ends when the provider goes away.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::error::McpError;

pub type Inbound = mpsc::Receiver<Value>;

/// Capacity of the inbound frame channel.
pub(crate) const INBOUND_CAPACITY: usize = 64;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: &Value) -> Result<(), McpError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&self) -> Result<(), McpError>;
}
