//! Database operations for the furniture inventory.
//!
//! Queries are checked at runtime rather than with the `query!` macros
//! because pgvector's `vector` type has no sqlx mapping; embeddings travel
//! as text literals cast with `::vector`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use shopchat_core::{ItemId, ItemPrices};

use super::{RepositoryError, escape_like, format_embedding};
use crate::agent::InventoryStore;
use crate::embeddings::EmbeddingClient;
use crate::models::{InventoryItem, ManufacturerAddress, NewInventoryItem, ScoredItem, UserReview};

/// Items embedded per `OpenAI` request when seeding.
const EMBED_CHUNK_SIZE: usize = 100;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` inventory queries.
#[derive(Debug, sqlx::FromRow)]
struct InventoryItemRow {
    id: i32,
    item_id: String,
    name: String,
    description: String,
    brand: String,
    manufacturer_address: Option<Json<ManufacturerAddress>>,
    full_price: Decimal,
    sale_price: Decimal,
    categories: Vec<String>,
    user_reviews: Json<Vec<UserReview>>,
    notes: Option<String>,
    embedding_text: String,
    created_at: DateTime<Utc>,
}

impl From<InventoryItemRow> for InventoryItem {
    fn from(row: InventoryItemRow) -> Self {
        Self {
            id: ItemId::new(row.id),
            item_id: row.item_id,
            name: row.name,
            description: row.description,
            brand: row.brand,
            manufacturer_address: row.manufacturer_address.map(|Json(address)| address),
            prices: ItemPrices::new(row.full_price, row.sale_price),
            categories: row.categories,
            user_reviews: row.user_reviews.0,
            notes: row.notes,
            embedding_text: row.embedding_text,
            created_at: row.created_at,
        }
    }
}

/// Inventory row plus cosine similarity to the query.
#[derive(Debug, sqlx::FromRow)]
struct ScoredItemRow {
    #[sqlx(flatten)]
    item: InventoryItemRow,
    score: f64,
}

impl From<ScoredItemRow> for ScoredItem {
    fn from(row: ScoredItemRow) -> Self {
        Self::semantic(row.item.into(), row.score)
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for inventory database operations.
#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
    embeddings: EmbeddingClient,
    min_similarity: f64,
}

impl InventoryRepository {
    /// Create a new inventory repository.
    ///
    /// `min_similarity` is the cosine similarity below which a vector match
    /// is not considered relevant.
    #[must_use]
    pub const fn new(pool: PgPool, embeddings: EmbeddingClient, min_similarity: f64) -> Self {
        Self {
            pool,
            embeddings,
            min_similarity,
        }
    }

    /// Insert or update items by SKU, embedding each one.
    ///
    /// Everything is written in one transaction: either every item is stored
    /// or none is.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Embedding` if an embedding request fails.
    /// Returns `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip(self, items), fields(count = items.len()))]
    pub async fn upsert_items(&self, items: &[NewInventoryItem]) -> Result<usize, RepositoryError> {
        let mut embedded = Vec::with_capacity(items.len());
        for chunk in items.chunks(EMBED_CHUNK_SIZE) {
            let texts: Vec<String> = chunk.iter().map(NewInventoryItem::embedding_text).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let vectors = self.embeddings.embed_batch(&refs).await?;
            embedded.extend(chunk.iter().zip(texts).zip(vectors));
        }

        let mut tx = self.pool.begin().await?;
        for ((item, text), vector) in &embedded {
            sqlx::query(
                r"
                INSERT INTO inventory_items (
                    item_id, name, description, brand, manufacturer_address,
                    full_price, sale_price, categories, user_reviews, notes,
                    embedding_text, embedding
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12::vector)
                ON CONFLICT (item_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    brand = EXCLUDED.brand,
                    manufacturer_address = EXCLUDED.manufacturer_address,
                    full_price = EXCLUDED.full_price,
                    sale_price = EXCLUDED.sale_price,
                    categories = EXCLUDED.categories,
                    user_reviews = EXCLUDED.user_reviews,
                    notes = EXCLUDED.notes,
                    embedding_text = EXCLUDED.embedding_text,
                    embedding = EXCLUDED.embedding,
                    updated_at = NOW()
                ",
            )
            .bind(&item.item_id)
            .bind(&item.name)
            .bind(&item.description)
            .bind(&item.brand)
            .bind(item.manufacturer_address.as_ref().map(Json))
            .bind(item.prices.full_price)
            .bind(item.prices.sale_price)
            .bind(&item.categories)
            .bind(Json(&item.user_reviews))
            .bind(&item.notes)
            .bind(text)
            .bind(format_embedding(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(count = embedded.len(), "inventory items upserted");
        Ok(embedded.len())
    }

    /// Delete every inventory item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM inventory_items")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl InventoryStore for InventoryRepository {
    async fn list_items(&self) -> Result<Vec<InventoryItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryItemRow>(
            r"
            SELECT id, item_id, name, description, brand, manufacturer_address,
                   full_price, sale_price, categories, user_reviews, notes,
                   embedding_text, created_at
            FROM inventory_items
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryItemRow>(
            r"
            SELECT id, item_id, name, description, brand, manufacturer_address,
                   full_price, sale_price, categories, user_reviews, notes,
                   embedding_text, created_at
            FROM inventory_items
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    async fn vector_search(&self, query: &str, limit: u32) -> Result<Vec<ScoredItem>, RepositoryError> {
        let embedding = self.embeddings.embed_query(query).await?;

        let rows = sqlx::query_as::<_, ScoredItemRow>(
            r"
            SELECT id, item_id, name, description, brand, manufacturer_address,
                   full_price, sale_price, categories, user_reviews, notes,
                   embedding_text, created_at,
                   1 - (embedding <=> $1::vector) AS score
            FROM inventory_items
            WHERE embedding IS NOT NULL
              AND 1 - (embedding <=> $1::vector) >= $2
            ORDER BY embedding <=> $1::vector
            LIMIT $3
            ",
        )
        .bind(format_embedding(&embedding))
        .bind(self.min_similarity)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(hits = rows.len(), "vector search complete");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn text_search(&self, query: &str, limit: u32) -> Result<Vec<InventoryItem>, RepositoryError> {
        let pattern = format!("%{}%", escape_like(query.trim()));

        let rows = sqlx::query_as::<_, InventoryItemRow>(
            r"
            SELECT id, item_id, name, description, brand, manufacturer_address,
                   full_price, sale_price, categories, user_reviews, notes,
                   embedding_text, created_at
            FROM inventory_items
            WHERE name ILIKE $1
               OR description ILIKE $1
               OR embedding_text ILIKE $1
               OR EXISTS (SELECT 1 FROM unnest(categories) AS category WHERE category ILIKE $1)
            ORDER BY id
            LIMIT $2
            ",
        )
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
