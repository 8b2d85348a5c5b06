//! Runs one conversation turn through the tool-use state machine.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use shopchat_core::ThreadId;

use crate::models::Message;

use super::conversation::ConversationStore;
use super::error::AgentError;
use super::model::{ChatModel, ModelTurn};
use super::prompt::render_system_prompt;
use super::retry::{RetryPolicy, with_backoff};
use super::state::{AgentEvent, AgentState, MAX_TRANSITIONS};
use super::tools::ToolExecutor;

/// The shopping assistant.
///
/// Cheap to clone; clones share the model client and stores.
#[derive(Clone)]
pub struct Agent {
    model: Arc<dyn ChatModel>,
    conversations: Arc<dyn ConversationStore>,
    tools: ToolExecutor,
    retry: RetryPolicy,
    max_transitions: usize,
}

impl Agent {
    #[must_use]
    pub fn new(
        model: Arc<dyn ChatModel>,
        conversations: Arc<dyn ConversationStore>,
        tools: ToolExecutor,
    ) -> Self {
        Self {
            model,
            conversations,
            tools,
            retry: RetryPolicy::default(),
            max_transitions: MAX_TRANSITIONS,
        }
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_max_transitions(mut self, max_transitions: usize) -> Self {
        self.max_transitions = max_transitions;
        self
    }

    /// Answer `message` in the context of `thread_id`'s history.
    ///
    /// Every message produced along the way is appended to the thread as
    /// soon as it exists, so a failed turn keeps what it already wrote.
    ///
    /// # Errors
    ///
    /// Returns `AgentError` if the model fails after retries, the store
    /// fails, or no final answer arrives within the transition budget.
    #[instrument(skip(self, message), fields(thread_id = %thread_id))]
    pub async fn respond(&self, thread_id: &ThreadId, message: &str) -> Result<String, AgentError> {
        let mut history = self.conversations.load(thread_id).await?;
        tracing::debug!(history_len = history.len(), "conversation loaded");

        self.record(thread_id, &mut history, vec![Message::user(message)])
            .await?;

        let mut state = AgentState::AwaitModel;
        let mut transitions = 0;

        loop {
            if !state.is_done() {
                if transitions >= self.max_transitions {
                    tracing::warn!(limit = self.max_transitions, "turn budget exhausted");
                    return Err(AgentError::TurnBudgetExceeded {
                        limit: self.max_transitions,
                    });
                }
                transitions += 1;
            }

            let (current, event) = match state {
                AgentState::Done(answer) => {
                    tracing::info!(transitions, "turn complete");
                    return Ok(answer);
                }
                AgentState::AwaitModel => {
                    let turn = self.generate(&history).await?;
                    let reply = Message::assistant(turn.text.clone(), turn.tool_calls.clone());
                    self.record(thread_id, &mut history, vec![reply]).await?;
                    (AgentState::AwaitModel, AgentEvent::ModelReplied(turn))
                }
                AgentState::AwaitTool(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let output = self.tools.execute(call).await;
                        results.push(Message::tool(call, output.content, output.is_error));
                    }
                    self.record(thread_id, &mut history, results).await?;
                    (AgentState::AwaitTool(calls), AgentEvent::ToolsCompleted)
                }
            };

            state = current.next(event)?;
        }
    }

    /// One generation step, retried on rate limits.
    async fn generate(&self, history: &[Message]) -> Result<ModelTurn, AgentError> {
        let system = render_system_prompt(Utc::now());
        let model = self.model.as_ref();
        let system = system.as_str();
        let tools = self.tools.definitions();

        let turn = with_backoff(&self.retry, move || model.generate(system, history, tools)).await?;
        tracing::debug!(tool_calls = turn.tool_calls.len(), "model replied");
        Ok(turn)
    }

    async fn record(
        &self,
        thread_id: &ThreadId,
        history: &mut Vec<Message>,
        messages: Vec<Message>,
    ) -> Result<(), AgentError> {
        self.conversations.append(thread_id, &messages).await?;
        history.extend(messages);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;

    use crate::agent::search::InventorySearch;
    use crate::agent::search::tests::{FakeStore, item};
    use crate::claude::{ClaudeError, Tool};
    use crate::db::RepositoryError;
    use crate::models::ToolCall;

    use super::*;

    /// Model fake that replays scripted replies and records what it saw.
    #[derive(Default)]
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ModelTurn, ClaudeError>>>,
        repeat_tool_calls: bool,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<ModelTurn, ClaudeError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn looping() -> Self {
            Self {
                repeat_tool_calls: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn generate(
            &self,
            system: &str,
            history: &[Message],
            tools: &[Tool],
        ) -> Result<ModelTurn, ClaudeError> {
            assert!(system.contains("Current time:"));
            assert_eq!(tools.len(), 1);
            self.seen.lock().expect("lock").push(history.to_vec());

            if self.repeat_tool_calls {
                return Ok(lookup("sofa"));
            }
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(answer("(no more replies)")))
        }
    }

    #[derive(Default)]
    struct MemoryConversations {
        threads: Mutex<HashMap<ThreadId, Vec<Message>>>,
    }

    impl MemoryConversations {
        fn thread(&self, id: &ThreadId) -> Vec<Message> {
            self.threads
                .lock()
                .expect("lock")
                .get(id)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ConversationStore for MemoryConversations {
        async fn load(&self, thread_id: &ThreadId) -> Result<Vec<Message>, RepositoryError> {
            Ok(self.thread(thread_id))
        }

        async fn append(&self, thread_id: &ThreadId, messages: &[Message]) -> Result<(), RepositoryError> {
            self.threads
                .lock()
                .expect("lock")
                .entry(thread_id.clone())
                .or_default()
                .extend_from_slice(messages);
            Ok(())
        }
    }

    fn answer(text: &str) -> ModelTurn {
        ModelTurn {
            text: text.to_string(),
            tool_calls: Vec::new(),
        }
    }

    fn lookup(query: &str) -> ModelTurn {
        ModelTurn {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("toolu_{query}"),
                name: "item_lookup".to_string(),
                input: json!({"query": query}),
            }],
        }
    }

    struct Harness {
        agent: Agent,
        model: Arc<ScriptedModel>,
        conversations: Arc<MemoryConversations>,
    }

    fn harness(model: ScriptedModel) -> Harness {
        let model = Arc::new(model);
        let conversations = Arc::new(MemoryConversations::default());
        let store = Arc::new(FakeStore {
            items: vec![item(1, "Harbor Sofa", "Navy blue velvet sofa", &["Sofas"])],
            ..FakeStore::default()
        });
        let agent = Agent::new(
            model.clone(),
            conversations.clone(),
            ToolExecutor::new(InventorySearch::new(store)),
        );
        Harness {
            agent,
            model,
            conversations,
        }
    }

    fn thread() -> ThreadId {
        ThreadId::parse("1700000000000").expect("valid thread id")
    }

    fn roles(messages: &[Message]) -> Vec<&'static str> {
        messages.iter().map(|m| m.role().as_str()).collect()
    }

    #[tokio::test]
    async fn test_direct_answer_without_tools() {
        let h = harness(ScriptedModel::new(vec![Ok(answer("Hello! How can I help?"))]));

        let reply = h.agent.respond(&thread(), "Hi").await.expect("reply");

        assert_eq!(reply, "Hello! How can I help?");
        assert_eq!(roles(&h.conversations.thread(&thread())), ["user", "assistant"]);
    }

    #[tokio::test]
    async fn test_tool_call_is_followed_by_one_tool_result() {
        let h = harness(ScriptedModel::new(vec![
            Ok(lookup("blue sofa")),
            Ok(answer("We have the Harbor Sofa.")),
        ]));

        let reply = h.agent.respond(&thread(), "Any blue sofas?").await.expect("reply");

        assert_eq!(reply, "We have the Harbor Sofa.");
        let stored = h.conversations.thread(&thread());
        assert_eq!(roles(&stored), ["user", "assistant", "tool", "assistant"]);

        let seen = h.model.seen.lock().expect("lock");
        let second_context = seen.get(1).expect("second generation");
        assert_eq!(roles(second_context), ["user", "assistant", "tool"]);
        match second_context.last() {
            Some(Message::Tool { content, tool_call_id, .. }) => {
                assert_eq!(tool_call_id, "toolu_blue sofa");
                assert_eq!(content["searchType"], "text");
            }
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_turn_sees_first_turn_in_order() {
        let h = harness(ScriptedModel::new(vec![
            Ok(lookup("sofa")),
            Ok(answer("The Harbor Sofa is in stock.")),
            Ok(answer("It costs 799.00.")),
        ]));

        h.agent.respond(&thread(), "Sofas?").await.expect("first turn");
        let first_turn = h.conversations.thread(&thread());
        h.agent.respond(&thread(), "What's its price?").await.expect("second turn");

        let seen = h.model.seen.lock().expect("lock");
        let context = seen.last().expect("third generation");
        assert_eq!(context.get(..first_turn.len()), Some(first_turn.as_slice()));
        assert_eq!(context.last(), Some(&Message::user("What's its price?")));
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let h = harness(ScriptedModel::new(vec![Ok(answer("one")), Ok(answer("two"))]));
        let other = ThreadId::parse("other").expect("valid thread id");

        h.agent.respond(&thread(), "first").await.expect("reply");
        h.agent.respond(&other, "second").await.expect("reply");

        let seen = h.model.seen.lock().expect("lock");
        assert_eq!(seen.get(1).map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_endless_tool_calls_exhaust_budget() {
        let h = harness(ScriptedModel::looping());

        let err = h.agent.respond(&thread(), "sofa?").await.expect_err("budget");

        assert!(matches!(err, AgentError::TurnBudgetExceeded { limit: 15 }));
        // 15 executed states alternate model/tool, starting with the model.
        assert_eq!(h.model.calls(), 8);
        let stored = h.conversations.thread(&thread());
        assert_eq!(stored.len(), 1 + 15);
    }

    #[tokio::test]
    async fn test_custom_budget() {
        let mut h = harness(ScriptedModel::looping());
        h.agent = h.agent.with_max_transitions(3);

        let err = h.agent.respond(&thread(), "sofa?").await.expect_err("budget");

        assert!(matches!(err, AgentError::TurnBudgetExceeded { limit: 3 }));
        assert_eq!(h.model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limits_are_retried() {
        let h = harness(ScriptedModel::new(vec![
            Err(ClaudeError::RateLimited(1)),
            Err(ClaudeError::RateLimited(1)),
            Ok(answer("Finally.")),
        ]));
        let start = Instant::now();

        let reply = h.agent.respond(&thread(), "Hi").await.expect("reply");

        assert_eq!(reply, "Finally.");
        assert!(start.elapsed() >= std::time::Duration::from_millis(6_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_rate_limit_fails_turn_but_keeps_user_message() {
        let h = harness(ScriptedModel::new(vec![
            Err(ClaudeError::RateLimited(1)),
            Err(ClaudeError::RateLimited(1)),
            Err(ClaudeError::RateLimited(1)),
        ]));

        let err = h.agent.respond(&thread(), "Hi").await.expect_err("rate limited");

        assert!(matches!(err, AgentError::RateLimited { attempts: 3 }));
        assert_eq!(h.model.calls(), 3);
        assert_eq!(h.conversations.thread(&thread()), vec![Message::user("Hi")]);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let h = harness(ScriptedModel::new(vec![Err(ClaudeError::Unauthorized(
            "Invalid API key".to_string(),
        ))]));

        let err = h.agent.respond(&thread(), "Hi").await.expect_err("unauthorized");

        assert!(matches!(err, AgentError::Unauthenticated));
        assert_eq!(h.model.calls(), 1);
    }
}
