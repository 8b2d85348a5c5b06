//! Database operations for conversation history.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use shopchat_core::{ChatRole, ThreadId};

use super::RepositoryError;
use crate::agent::ConversationStore;
use crate::models::Message;

/// Internal row type for `PostgreSQL` message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    position: i32,
    role: ChatRole,
    content: Json<Message>,
}

impl TryFrom<MessageRow> for Message {
    type Error = RepositoryError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let message = row.content.0;
        if message.role() != row.role {
            return Err(RepositoryError::DataCorruption(format!(
                "message {} stored as {} but its content is a {} message",
                row.position,
                row.role,
                message.role()
            )));
        }
        Ok(message)
    }
}

/// Repository for conversation history.
#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    /// Create a new conversation repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of distinct threads with at least one message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_threads(&self) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT thread_id) FROM conversation_messages")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Total number of stored messages across all threads.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_messages(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversation_messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    async fn load(&self, thread_id: &ThreadId) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r"
            SELECT position, role, content
            FROM conversation_messages
            WHERE thread_id = $1
            ORDER BY position
            ",
        )
        .bind(thread_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn append(&self, thread_id: &ThreadId, messages: &[Message]) -> Result<(), RepositoryError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        // Serializes appends to the same thread until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(thread_id.as_str())
            .execute(&mut *tx)
            .await?;

        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM conversation_messages WHERE thread_id = $1",
        )
        .bind(thread_id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for (position, message) in (next..).zip(messages) {
            sqlx::query(
                r"
                INSERT INTO conversation_messages (thread_id, position, role, content)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(thread_id.as_str())
            .bind(position)
            .bind(message.role())
            .bind(Json(message))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(position: i32, role: ChatRole, message: Message) -> MessageRow {
        MessageRow {
            position,
            role,
            content: Json(message),
        }
    }

    #[test]
    fn test_row_with_matching_role_converts() {
        let message = Message::try_from(row(0, ChatRole::User, Message::user("Any sofas?"))).expect("valid row");
        assert_eq!(message, Message::user("Any sofas?"));
    }

    #[test]
    fn test_role_mismatch_is_data_corruption() {
        let err = Message::try_from(row(3, ChatRole::Assistant, Message::user("Any sofas?")))
            .expect_err("role column disagrees with content");

        match err {
            RepositoryError::DataCorruption(reason) => {
                assert!(reason.contains("message 3"), "unexpected reason: {reason}");
                assert!(reason.contains("assistant"));
                assert!(reason.contains("user"));
            }
            other => panic!("expected DataCorruption, got {other:?}"),
        }
    }
}
