//! Conversation domain models.
//!
//! A conversation is an append-only list of [`Message`]s keyed by
//! [`ThreadId`](shopchat_core::ThreadId). Messages are stored as JSON, so the
//! serde representation below is also the storage format.

use serde::{Deserialize, Serialize};

use shopchat_core::ChatRole;

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Shopper input.
    User { content: String },
    /// Model output, optionally requesting tool calls.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// JSON output of one tool call.
    Tool {
        tool_call_id: String,
        name: String,
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID, echoed back in the tool message.
    pub id: String,
    pub name: String,
    /// Raw arguments; validated by the tool before use.
    pub input: serde_json::Value,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    #[must_use]
    pub fn tool(call: &ToolCall, content: serde_json::Value, is_error: bool) -> Self {
        Self::Tool {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            is_error,
        }
    }

    /// Role of the message author.
    #[must_use]
    pub const fn role(&self) -> ChatRole {
        match self {
            Self::User { .. } => ChatRole::User,
            Self::Assistant { .. } => ChatRole::Assistant,
            Self::Tool { .. } => ChatRole::Tool,
        }
    }

    /// Tool calls requested by an assistant message.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}
