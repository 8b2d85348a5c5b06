//! Integration test support for shopchat.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (no database or API keys needed)
//! cargo test -p shopchat-integration-tests
//!
//! # Live-server tests (start Postgres, migrate, seed, run the API first)
//! cargo test -p shopchat-integration-tests -- --ignored
//! ```
//!
//! The in-process tests drive the real router through `tower::ServiceExt`
//! with the collaborators below standing in for Claude, `OpenAI` and
//! `PostgreSQL`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use shopchat_api::agent::{
    Agent, ChatModel, ConversationStore, ITEM_LOOKUP, InventorySearch, InventoryStore, ModelTurn, RetryPolicy,
    ToolExecutor,
};
use shopchat_api::claude::{ClaudeError, Tool};
use shopchat_api::db::RepositoryError;
use shopchat_api::models::{InventoryItem, Message, ScoredItem, ToolCall};
use shopchat_api::routes;
use shopchat_api::state::AppState;
use shopchat_core::{ItemId, ItemPrices, ThreadId};

/// Similarity floor applied by [`MemoryInventory::vector_search`].
pub const MIN_SIMILARITY: f64 = 0.25;

// =============================================================================
// Inventory
// =============================================================================

/// Build an inventory item with the given catalog data.
#[must_use]
pub fn item(id: i32, name: &str, description: &str, categories: &[&str], full: i64, sale: i64) -> InventoryItem {
    InventoryItem {
        id: ItemId::new(id),
        item_id: format!("SKU-{id:03}"),
        name: name.to_string(),
        description: description.to_string(),
        brand: "Coastline Home".to_string(),
        manufacturer_address: None,
        prices: ItemPrices::new(Decimal::new(full, 2), Decimal::new(sale, 2)),
        categories: categories.iter().map(|c| (*c).to_string()).collect(),
        user_reviews: Vec::new(),
        notes: None,
        embedding_text: format!("{name}: {description} Categories: {}", categories.join(", ")),
        created_at: Utc::now(),
    }
}

/// A small catalog with exactly one blue sofa.
#[must_use]
pub fn furniture() -> Vec<InventoryItem> {
    vec![
        item(1, "Harbor Velvet Sofa", "Three-seat sofa in navy blue velvet", &["Sofas"], 129_900, 99_900),
        item(2, "Oakridge Dining Table", "Solid white oak table that seats six", &["Tables"], 145_000, 127_500),
        item(3, "Arc Floor Lamp", "Brass floor lamp with a marble base", &["Lighting"], 32_000, 27_900),
    ]
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| {
            let t = t.to_lowercase();
            t.strip_suffix('s').map_or_else(|| t.clone(), str::to_string)
        })
        .collect()
}

/// In-memory inventory with a token-overlap stand-in for vector search.
#[derive(Default)]
pub struct MemoryInventory {
    items: Vec<InventoryItem>,
    fail: bool,
}

impl MemoryInventory {
    #[must_use]
    pub const fn new(items: Vec<InventoryItem>) -> Self {
        Self { items, fail: false }
    }

    /// An inventory whose every call fails, like an unreachable database.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail {
            return Err(RepositoryError::DataCorruption("inventory unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn list_items(&self) -> Result<Vec<InventoryItem>, RepositoryError> {
        self.check()?;
        Ok(self.items.clone())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        self.check()?;
        Ok(self.items.iter().find(|i| i.id == id).cloned())
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        self.check()?;
        Ok(i64::try_from(self.items.len()).unwrap_or(i64::MAX))
    }

    async fn vector_search(&self, query: &str, limit: u32) -> Result<Vec<ScoredItem>, RepositoryError> {
        self.check()?;
        let wanted = tokens(query);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        #[allow(clippy::cast_precision_loss)]
        let mut hits: Vec<ScoredItem> = self
            .items
            .iter()
            .map(|item| {
                let overlap = tokens(&item.embedding_text).intersection(&wanted).count();
                ScoredItem::semantic(item.clone(), overlap as f64 / wanted.len() as f64)
            })
            .filter(|hit| hit.score.unwrap_or_default() >= MIN_SIMILARITY)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn text_search(&self, query: &str, limit: u32) -> Result<Vec<InventoryItem>, RepositoryError> {
        self.check()?;
        let needle = query.to_lowercase();
        Ok(self
            .items
            .iter()
            .filter(|i| {
                i.name.to_lowercase().contains(&needle)
                    || i.description.to_lowercase().contains(&needle)
                    || i.embedding_text.to_lowercase().contains(&needle)
                    || i.categories.iter().any(|c| c.to_lowercase().contains(&needle))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// In-memory conversation store.
#[derive(Default)]
pub struct MemoryConversations {
    threads: Mutex<HashMap<ThreadId, Vec<Message>>>,
}

impl MemoryConversations {
    /// Stored messages of a thread, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn thread(&self, id: &str) -> Vec<Message> {
        let Ok(id) = ThreadId::parse(id) else {
            return Vec::new();
        };
        self.threads
            .lock()
            .expect("conversation lock poisoned")
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversations {
    async fn load(&self, thread_id: &ThreadId) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.thread(thread_id.as_str()))
    }

    async fn append(&self, thread_id: &ThreadId, messages: &[Message]) -> Result<(), RepositoryError> {
        self.threads
            .lock()
            .map_err(|_| RepositoryError::DataCorruption("conversation lock poisoned".to_string()))?
            .entry(thread_id.clone())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }
}

// =============================================================================
// Models
// =============================================================================

/// Deterministic stand-in for Claude.
///
/// On a new shopper question it calls `item_lookup` with the question as the
/// query; after a lookup it names the top result and its price. A question
/// about price is answered from the most recent lookup in the history.
#[derive(Default)]
pub struct CatalogModel {
    calls: Mutex<usize>,
}

impl CatalogModel {
    /// Number of generations so far.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("call counter poisoned")
    }
}

fn latest_hit(history: &[Message]) -> Option<&Value> {
    history.iter().rev().find_map(|message| match message {
        Message::Tool { content, .. } => content.get("results").and_then(|r| r.get(0)),
        _ => None,
    })
}

fn describe(hit: &Value) -> (String, String) {
    let name = hit["name"].as_str().unwrap_or("that item").to_string();
    let price = hit["prices"]["sale_price"].as_str().unwrap_or("unknown").to_string();
    (name, price)
}

fn answer(text: String) -> ModelTurn {
    ModelTurn {
        text,
        tool_calls: Vec::new(),
    }
}

#[async_trait]
impl ChatModel for CatalogModel {
    async fn generate(&self, _system: &str, history: &[Message], tools: &[Tool]) -> Result<ModelTurn, ClaudeError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        assert!(tools.iter().any(|t| t.name == ITEM_LOOKUP), "item_lookup must be offered");

        match history.last() {
            Some(Message::Tool { content, .. }) => Ok(answer(match content["status"].as_str() {
                Some("found") => match latest_hit(history) {
                    Some(hit) => {
                        let (name, price) = describe(hit);
                        format!("Yes! We have the {name}, currently ${price}.")
                    }
                    None => "Sorry, nothing in our inventory matches that.".to_string(),
                },
                Some("empty_inventory") => "Sorry, no products are available right now.".to_string(),
                _ => "Sorry, I couldn't search the inventory just now.".to_string(),
            })),
            Some(Message::User { content }) if content.to_lowercase().contains("price") => {
                Ok(answer(latest_hit(history).map_or_else(
                    || "Which item would you like the price of?".to_string(),
                    |hit| {
                        let (name, price) = describe(hit);
                        format!("The {name} is ${price}.")
                    },
                )))
            }
            Some(Message::User { content }) => Ok(ModelTurn {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: format!("toolu_{}", self.calls()),
                    name: ITEM_LOOKUP.to_string(),
                    input: json!({ "query": content }),
                }],
            }),
            _ => Ok(answer("How can I help?".to_string())),
        }
    }
}

/// A model that always fails with the error `make` builds.
pub struct FailingModel {
    make: fn() -> ClaudeError,
}

impl FailingModel {
    #[must_use]
    pub const fn new(make: fn() -> ClaudeError) -> Self {
        Self { make }
    }
}

#[async_trait]
impl ChatModel for FailingModel {
    async fn generate(&self, _system: &str, _history: &[Message], _tools: &[Tool]) -> Result<ModelTurn, ClaudeError> {
        Err((self.make)())
    }
}

// =============================================================================
// Application
// =============================================================================

/// A router wired to in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub conversations: Arc<MemoryConversations>,
}

impl TestApp {
    /// Build the real router around `model` and `inventory`.
    ///
    /// Retry waits are shortened to milliseconds.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, inventory: MemoryInventory) -> Self {
        let inventory: Arc<dyn InventoryStore> = Arc::new(inventory);
        let conversations = Arc::new(MemoryConversations::default());

        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let agent = Agent::new(
            model,
            conversations.clone(),
            ToolExecutor::new(InventorySearch::new(inventory.clone())),
        )
        .with_retry_policy(retry);

        Self {
            router: routes::app(AppState::new(inventory, agent)),
            conversations,
        }
    }

    /// The furniture catalog answered by [`CatalogModel`].
    #[must_use]
    pub fn furniture() -> Self {
        Self::new(Arc::new(CatalogModel::default()), MemoryInventory::new(furniture()))
    }
}
