//! Seed the inventory from a JSON or YAML file.
//!
//! Each item's embedding text is taken from the file or, when absent, built
//! from its name, description, brand, categories, prices and reviews. Texts
//! are embedded via `OpenAI` in batches and items are upserted by SKU.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use secrecy::SecretString;
use tracing::{error, info};

use shopchat_api::config::{DEFAULT_EMBEDDING_MODEL, OpenAIConfig, validate_embedding_model};
use shopchat_api::db::{self, InventoryRepository};
use shopchat_api::embeddings::EmbeddingClient;
use shopchat_api::models::NewInventoryItem;

/// Seed inventory items from a file.
///
/// # Arguments
///
/// * `path` - Path to a `.json`, `.yaml` or `.yml` file holding an array of items
/// * `clear_existing` - If true, delete every existing item first
///
/// # Errors
///
/// Returns an error if environment variables are missing, the file cannot be
/// read or fails validation, or database operations fail.
pub async fn inventory(path: &Path, clear_existing: bool) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let openai = OpenAIConfig {
        api_key: std::env::var("OPENAI_API_KEY")
            .map(SecretString::from)
            .map_err(|_| "OPENAI_API_KEY not set")?,
        embedding_model: std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
    };
    validate_embedding_model(&openai.embedding_model)?;

    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }

    info!(path = %path.display(), "Loading inventory from file");

    // Read and validate before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let items = parse_items(path, &content)?;
    info!(items = items.len(), "Parsed inventory");

    let errors = validate_items(&items);
    if !errors.is_empty() {
        error!("Inventory validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    info!("Inventory validated successfully");

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let embeddings = EmbeddingClient::new(&openai)?;
    let repository = InventoryRepository::new(pool, embeddings, 0.0);

    if clear_existing {
        let removed = repository.clear().await?;
        info!(removed, "Cleared existing inventory");
    }

    let upserted = repository.upsert_items(&items).await?;

    info!("Seeding complete!");
    info!("  Items upserted: {upserted}");

    Ok(())
}

/// Parse an item array, choosing the format by file extension.
fn parse_items(path: &Path, content: &str) -> Result<Vec<NewInventoryItem>, Box<dyn std::error::Error>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(content)?),
        _ => Ok(serde_json::from_str(content)?),
    }
}

/// Check items for problems that would make them unsearchable or wrong.
fn validate_items(items: &[NewInventoryItem]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let label = if item.item_id.trim().is_empty() {
            format!("item #{index}")
        } else {
            item.item_id.clone()
        };

        if item.item_id.trim().is_empty() {
            errors.push(format!("{label}: item_id is empty"));
        } else if !seen.insert(item.item_id.as_str()) {
            errors.push(format!("{label}: duplicate item_id"));
        }
        if item.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if item.prices.full_price < Decimal::ZERO || item.prices.sale_price < Decimal::ZERO {
            errors.push(format!("{label}: prices must not be negative"));
        }
        for review in &item.user_reviews {
            if !(1..=5).contains(&review.rating) {
                errors.push(format!("{label}: review rating {} is outside 1-5", review.rating));
            }
        }
    }

    errors
}
