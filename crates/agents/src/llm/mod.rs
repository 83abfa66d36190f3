//! Model integration layer.
//!
//! - [`types`] -- messages, tool calls and requests.
//! - [`client`] -- the [`LanguageModel`] seam and the Anthropic HTTP client.
//! - [`scripted`] -- a replaying model for tests and offline runs.

pub mod client;
pub mod scripted;
pub mod types;

pub use client::{AnthropicClient, LanguageModel};
pub use scripted::ScriptedModel;
pub use types::{ChatRequest, LlmResponse, Message, Role, ToolCall, ToolDefinition};
