//! Tool-using shopping assistant.
//!
//! One call to [`Agent::respond`] runs a single conversation turn: the
//! shopper's message is appended to the thread, then the model and the
//! inventory tool alternate until the model answers without asking for a
//! tool, or the turn runs out of steps.
//!
//! External systems sit behind ports so the loop can be driven by fakes:
//!
//! - [`ChatModel`] - the language model (Claude in production)
//! - [`ConversationStore`] - per-thread message history (`PostgreSQL`)
//! - [`InventoryStore`] - catalog reads and search (`PostgreSQL` + pgvector)

mod conversation;
mod error;
mod model;
mod prompt;
pub mod retry;
mod runner;
pub mod search;
mod state;
pub mod tools;

pub use conversation::ConversationStore;
pub use error::{AgentError, FailureKind};
pub use model::{ChatModel, ModelTurn};
pub use prompt::render_system_prompt;
pub use retry::{RateLimitSignal, RetryError, RetryPolicy, with_backoff};
pub use runner::Agent;
pub use search::{DEFAULT_RESULT_LIMIT, InventorySearch, InventoryStore, SearchMode, SearchOutcome};
pub use state::{AgentEvent, AgentState, InvalidTransition, MAX_TRANSITIONS};
pub use tools::{ITEM_LOOKUP, ItemLookupArgs, ToolExecutor, ToolOutput, item_lookup_tool};
