//! Language-model port and its Claude implementation.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::claude::{ChatResponse, ClaudeClient, ClaudeError, ContentBlock, Message as ClaudeMessage, Tool};
use crate::models::{Message, ToolCall};

/// One generated assistant turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub text: String,
    /// Empty when the model produced a final answer.
    pub tool_calls: Vec<ToolCall>,
}

impl From<ChatResponse> for ModelTurn {
    fn from(response: ChatResponse) -> Self {
        let mut turn = Self::default();
        for block in response.content {
            match block {
                ContentBlock::Text { text } => turn.text.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => {
                    turn.tool_calls.push(ToolCall { id, name, input });
                }
                ContentBlock::ToolResult { .. } => {}
            }
        }
        turn
    }
}

/// Generates the next assistant turn from the conversation so far.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        tools: &[Tool],
    ) -> Result<ModelTurn, ClaudeError>;
}

#[async_trait]
impl ChatModel for ClaudeClient {
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        tools: &[Tool],
    ) -> Result<ModelTurn, ClaudeError> {
        let messages = to_claude_messages(history);
        let tools = (!tools.is_empty()).then(|| tools.to_vec());
        let response = self.chat(messages, Some(system.to_string()), tools).await?;
        Ok(response.into())
    }
}

const INTERRUPTED_TOOL_RESULT: &str =
    r#"{"status":"failed","error":"Interrupted","message":"The tool call did not complete."}"#;

/// Groups stored messages into Claude's alternating user/assistant format.
///
/// Consecutive tool messages become one user message of `tool_result`
/// blocks. Tool calls left without a result (a turn that failed midway) get
/// a synthetic failure result so the request stays valid.
struct MessageBuilder {
    result: Vec<ClaudeMessage>,
    tool_results: Vec<ContentBlock>,
    pending_calls: Vec<String>,
}

impl MessageBuilder {
    const fn new() -> Self {
        Self {
            result: Vec::new(),
            tool_results: Vec::new(),
            pending_calls: Vec::new(),
        }
    }

    fn flush_tool_results(&mut self) {
        let answered: HashSet<&str> = self
            .tool_results
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        let missing: Vec<ContentBlock> = self
            .pending_calls
            .iter()
            .filter(|id| !answered.contains(id.as_str()))
            .map(|id| ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content: INTERRUPTED_TOOL_RESULT.to_string(),
                is_error: Some(true),
            })
            .collect();
        self.tool_results.extend(missing);
        self.pending_calls.clear();

        if !self.tool_results.is_empty() {
            self.result
                .push(ClaudeMessage::user_blocks(std::mem::take(&mut self.tool_results)));
        }
    }

    fn add(&mut self, message: &Message) {
        match message {
            Message::User { content } => {
                self.flush_tool_results();
                self.result.push(ClaudeMessage::user(content.clone()));
            }
            Message::Assistant { content, tool_calls } => {
                self.flush_tool_results();

                let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
                if !content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: content.clone(),
                    });
                }
                for call in tool_calls {
                    self.pending_calls.push(call.id.clone());
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.input.clone(),
                    });
                }
                if !blocks.is_empty() {
                    self.result.push(ClaudeMessage::assistant_blocks(blocks));
                }
            }
            Message::Tool {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                self.tool_results.push(ContentBlock::ToolResult {
                    tool_use_id: tool_call_id.clone(),
                    content: content.to_string(),
                    is_error: is_error.then_some(true),
                });
            }
        }
    }

    fn finish(mut self) -> Vec<ClaudeMessage> {
        self.flush_tool_results();
        self.result
    }
}

/// Convert stored conversation messages to Claude API messages.
fn to_claude_messages(history: &[Message]) -> Vec<ClaudeMessage> {
    let mut builder = MessageBuilder::new();
    for message in history {
        builder.add(message);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::claude::MessageContent;

    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "item_lookup".to_string(),
            input: json!({"query": "sofa"}),
        }
    }

    fn roles(messages: &[ClaudeMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.role.as_str()).collect()
    }

    fn blocks(message: Option<&ClaudeMessage>) -> &[ContentBlock] {
        match message.map(|m| &m.content) {
            Some(MessageContent::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }

    #[test]
    fn test_tool_round_trip_alternates_roles() {
        let history = vec![
            Message::user("Any blue sofas?"),
            Message::assistant("Let me look.", vec![call("t1")]),
            Message::tool(&call("t1"), json!({"count": 1}), false),
            Message::assistant("Yes, the Harbor Sofa.", Vec::new()),
        ];

        let messages = to_claude_messages(&history);

        assert_eq!(roles(&messages), ["user", "assistant", "user", "assistant"]);
        assert_eq!(blocks(messages.get(1)).len(), 2);
        assert!(matches!(
            blocks(messages.get(2)).first(),
            Some(ContentBlock::ToolResult { tool_use_id, is_error: None, .. }) if tool_use_id == "t1"
        ));
    }

    #[test]
    fn test_parallel_tool_results_share_one_user_message() {
        let history = vec![
            Message::user("Sofas and tables?"),
            Message::assistant("", vec![call("a"), call("b")]),
            Message::tool(&call("a"), json!({}), false),
            Message::tool(&call("b"), json!({}), true),
        ];

        let messages = to_claude_messages(&history);

        assert_eq!(roles(&messages), ["user", "assistant", "user"]);
        assert_eq!(blocks(messages.get(1)).len(), 2);
        let results = blocks(messages.get(2));
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results.get(1),
            Some(ContentBlock::ToolResult { is_error: Some(true), .. })
        ));
    }

    #[test]
    fn test_unanswered_tool_call_gets_synthetic_result() {
        let history = vec![
            Message::user("Sofas?"),
            Message::assistant("", vec![call("lost")]),
            Message::user("Hello?"),
        ];

        let messages = to_claude_messages(&history);

        assert_eq!(roles(&messages), ["user", "assistant", "user", "user"]);
        assert!(matches!(
            blocks(messages.get(2)).first(),
            Some(ContentBlock::ToolResult { tool_use_id, is_error: Some(true), .. }) if tool_use_id == "lost"
        ));
    }

    #[test]
    fn test_model_turn_from_response() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-test",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Checking "},
                {"type": "text", "text": "inventory."},
                {"type": "tool_use", "id": "t1", "name": "item_lookup", "input": {"query": "sofa"}}
            ],
            "usage": {"input_tokens": 1, "output_tokens": 1}
        }))
        .expect("deserialize");

        let turn = ModelTurn::from(response);

        assert_eq!(turn.text, "Checking inventory.");
        assert_eq!(turn.tool_calls, vec![call("t1")]);
    }
}
