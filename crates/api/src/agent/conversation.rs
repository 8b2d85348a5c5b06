//! Conversation state port.

use async_trait::async_trait;

use shopchat_core::ThreadId;

use crate::db::RepositoryError;
use crate::models::Message;

/// Append-only conversation history keyed by thread.
///
/// Implementations must keep messages in append order and never rewrite
/// stored messages. Concurrent appends to the same thread are not ordered
/// relative to each other.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Full history of a thread, oldest first. Unknown threads are empty.
    async fn load(&self, thread_id: &ThreadId) -> Result<Vec<Message>, RepositoryError>;

    /// Append messages to the end of a thread.
    async fn append(&self, thread_id: &ThreadId, messages: &[Message]) -> Result<(), RepositoryError>;
}
