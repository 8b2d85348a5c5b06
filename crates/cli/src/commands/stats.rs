//! Inventory and conversation statistics.

use tracing::info;

use shopchat_api::db::{self, ConversationRepository};

/// Print inventory size and conversation counts.
///
/// Reads only; needs no embedding credentials.
///
/// # Errors
///
/// Returns an error if database connection fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let conversations = ConversationRepository::new(pool.clone());
    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items")
        .fetch_one(&pool)
        .await?;
    let with_embedding: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE embedding IS NOT NULL")
            .fetch_one(&pool)
            .await?;

    info!("shopchat Statistics");
    info!("===================");
    info!("Inventory items: {items} ({with_embedding} embedded)");
    info!("Conversation threads: {}", conversations.count_threads().await?);
    info!("Conversation messages: {}", conversations.count_messages().await?);

    Ok(())
}
