//! Remote tool providers speaking JSON-RPC over a subprocess or an event stream.

pub mod client;
pub mod error;
pub mod host;
pub mod protocol;
pub mod sse;
pub mod stdio;
pub mod transport;

pub use client::McpClient;
pub use error::McpError;
pub use host::{ProviderState, RemoteTool, ToolHost};
pub use transport::Transport;
