//! Database operations for the shopchat `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `inventory_items` - Furniture catalog with pgvector embeddings
//! - `conversation_messages` - Append-only chat history keyed by thread id
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shopchat-cli -- migrate
//! ```

pub mod conversations;
pub mod inventory;

use std::fmt::Write as _;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::embeddings::EmbeddingError;

pub use conversations::ConversationRepository;
pub use inventory::InventoryRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// The query embedding could not be computed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Format an embedding as a pgvector text literal (`[0.1,0.2,...]`).
///
/// Bind the result as text and cast with `$n::vector` in SQL.
#[must_use]
pub fn format_embedding(embedding: &[f32]) -> String {
    let mut literal = String::with_capacity(embedding.len() * 12 + 2);
    literal.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        let _ = write!(literal, "{value}");
    }
    literal.push(']');
    literal
}

/// Escape `%`, `_` and `\` so user text matches literally inside `LIKE`.
#[must_use]
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
