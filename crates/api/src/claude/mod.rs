//! Claude API integration for the shopping assistant.
//!
//! A thin, non-streaming client for the Anthropic Messages API. The agent
//! loop drives it through the [`ChatModel`](crate::agent::ChatModel) port, so
//! this module knows nothing about conversations or inventory.

mod client;
mod error;
pub mod types;

pub use client::ClaudeClient;
pub use error::{ApiError, ApiErrorResponse, ClaudeError};
pub use types::{ChatRequest, ChatResponse, ContentBlock, Message, MessageContent, StopReason, Tool};
