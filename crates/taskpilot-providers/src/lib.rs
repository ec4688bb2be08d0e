//! Reasoning collaborator layer for Taskpilot.
//!
//! - [`traits::LlmProvider`] — trait the agent talks to
//! - [`http_provider::HttpProvider`] — OpenAI-compatible HTTP client
//! - [`error::LlmError`] — failure kinds, including the token-limit kind the
//!   dispatcher special-cases

pub mod error;
pub mod http_provider;
pub mod traits;

pub use error::LlmError;
pub use http_provider::HttpProvider;
pub use traits::{LlmProvider, LlmRequestConfig};
