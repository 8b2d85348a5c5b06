//! Tool-use state machine.
//!
//! ```text
//!             ModelReplied (no tool calls)
//! AwaitModel ─────────────────────────────▶ Done
//!     ▲   │ ModelReplied (tool calls)
//!     │   ▼
//!  AwaitTool
//!     ToolsCompleted
//! ```

use thiserror::Error;

use crate::models::ToolCall;

use super::model::ModelTurn;

/// Maximum number of executed states per turn before the loop gives up.
pub const MAX_TRANSITIONS: usize = 15;

/// Where the loop is within one conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentState {
    /// Waiting for the model to produce the next assistant message.
    AwaitModel,
    /// Waiting for the requested tool calls to run.
    AwaitTool(Vec<ToolCall>),
    /// Final answer produced.
    Done(String),
}

/// Result of executing a state.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ModelReplied(ModelTurn),
    ToolsCompleted,
}

/// An event arrived in a state that cannot handle it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} on {event}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub event: &'static str,
}

impl AgentState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AwaitModel => "await_model",
            Self::AwaitTool(_) => "await_tool",
            Self::Done(_) => "done",
        }
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Transition function.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when `event` does not belong to this state.
    pub fn next(self, event: AgentEvent) -> Result<Self, InvalidTransition> {
        match (self, event) {
            (Self::AwaitModel, AgentEvent::ModelReplied(turn)) => {
                if turn.tool_calls.is_empty() {
                    Ok(Self::Done(turn.text))
                } else {
                    Ok(Self::AwaitTool(turn.tool_calls))
                }
            }
            (Self::AwaitTool(_), AgentEvent::ToolsCompleted) => Ok(Self::AwaitModel),
            (state, event) => Err(InvalidTransition {
                from: state.name(),
                event: event.name(),
            }),
        }
    }
}

impl AgentEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::ModelReplied(_) => "model_replied",
            Self::ToolsCompleted => "tools_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn turn(text: &str, calls: usize) -> ModelTurn {
        ModelTurn {
            text: text.to_string(),
            tool_calls: (0..calls)
                .map(|i| ToolCall {
                    id: format!("t{i}"),
                    name: "item_lookup".to_string(),
                    input: json!({"query": "sofa"}),
                })
                .collect(),
        }
    }

    #[test]
    fn test_final_answer_completes() {
        let next = AgentState::AwaitModel
            .next(AgentEvent::ModelReplied(turn("Here you go", 0)))
            .expect("valid transition");
        assert_eq!(next, AgentState::Done("Here you go".to_string()));
        assert!(next.is_done());
    }

    #[test]
    fn test_tool_request_awaits_tool() {
        let next = AgentState::AwaitModel
            .next(AgentEvent::ModelReplied(turn("", 2)))
            .expect("valid transition");
        assert!(matches!(next, AgentState::AwaitTool(ref calls) if calls.len() == 2));
    }

    #[test]
    fn test_tool_completion_returns_to_model() {
        let next = AgentState::AwaitTool(turn("", 1).tool_calls)
            .next(AgentEvent::ToolsCompleted)
            .expect("valid transition");
        assert_eq!(next, AgentState::AwaitModel);
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let err = AgentState::Done("x".to_string())
            .next(AgentEvent::ToolsCompleted)
            .expect_err("done is terminal");
        assert_eq!(err.from, "done");

        let err = AgentState::AwaitModel
            .next(AgentEvent::ToolsCompleted)
            .expect_err("no tool pending");
        assert_eq!(err.to_string(), "invalid transition from await_model on tools_completed");
    }
}
