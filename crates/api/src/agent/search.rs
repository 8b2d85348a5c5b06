//! Inventory search gateway.
//!
//! Prefers semantic (embedding) search and falls back to case-insensitive
//! substring matching when no item is similar enough. The gateway never
//! fails: store errors are reshaped into a [`SearchOutcome::Failed`] payload
//! that the model can read and react to.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use shopchat_core::ItemId;

use crate::db::RepositoryError;
use crate::models::{InventoryItem, ScoredItem};

/// Default number of results per search.
pub const DEFAULT_RESULT_LIMIT: u32 = 10;

const EMPTY_INVENTORY_ERROR: &str = "No items found in inventory";
const EMPTY_INVENTORY_MESSAGE: &str = "The inventory collection is empty. Let the customer know no products are currently available.";
const SEARCH_FAILED_ERROR: &str = "Search failed";

/// Read access to the inventory store.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Every item, in catalog order.
    async fn list_items(&self) -> Result<Vec<InventoryItem>, RepositoryError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, RepositoryError>;

    async fn count_items(&self) -> Result<i64, RepositoryError>;

    /// Up to `limit` items ranked by embedding similarity to `query`.
    async fn vector_search(&self, query: &str, limit: u32) -> Result<Vec<ScoredItem>, RepositoryError>;

    /// Up to `limit` items whose name, description, embedding text or any
    /// category contains `query`, ignoring case.
    async fn text_search(&self, query: &str, limit: u32) -> Result<Vec<InventoryItem>, RepositoryError>;
}

/// Which strategy produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    Text,
}

impl SearchMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Text => "text",
        }
    }
}

/// Tool output of an inventory search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Search ran; `results` may still be empty for a text search.
    Found {
        #[serde(rename = "searchType")]
        search_type: SearchMode,
        query: String,
        count: usize,
        results: Vec<ScoredItem>,
    },
    /// The inventory holds no items at all.
    EmptyInventory {
        error: String,
        message: String,
        count: usize,
    },
    /// The store could not answer.
    Failed {
        error: String,
        message: String,
        query: String,
    },
}

impl SearchOutcome {
    fn found(mode: SearchMode, query: &str, results: Vec<ScoredItem>) -> Self {
        Self::Found {
            search_type: mode,
            query: query.to_string(),
            count: results.len(),
            results,
        }
    }

    fn empty_inventory() -> Self {
        Self::EmptyInventory {
            error: EMPTY_INVENTORY_ERROR.to_string(),
            message: EMPTY_INVENTORY_MESSAGE.to_string(),
            count: 0,
        }
    }

    /// A failure payload carrying a readable reason and the original query.
    #[must_use]
    pub fn failed(message: impl Into<String>, query: &str) -> Self {
        Self::Failed {
            error: SEARCH_FAILED_ERROR.to_string(),
            message: message.into(),
            query: query.to_string(),
        }
    }

    /// Number of items returned.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Found { count, .. } | Self::EmptyInventory { count, .. } => *count,
            Self::Failed { .. } => 0,
        }
    }

    /// Whether this outcome carries an error tag.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        !matches!(self, Self::Found { .. })
    }

    /// JSON payload handed back to the model.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "status": "failed",
                "error": SEARCH_FAILED_ERROR,
                "message": format!("result could not be encoded: {e}"),
            })
        })
    }
}

/// Search gateway over an [`InventoryStore`].
#[derive(Clone)]
pub struct InventorySearch {
    store: Arc<dyn InventoryStore>,
}

impl InventorySearch {
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Search for up to `limit` items matching `query`.
    ///
    /// `limit` must be positive; callers validate it before getting here.
    #[tracing::instrument(
        skip(self),
        fields(search_type = tracing::field::Empty, count = tracing::field::Empty)
    )]
    pub async fn search(&self, query: &str, limit: u32) -> SearchOutcome {
        let outcome = match self.try_search(query, limit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "inventory search failed");
                SearchOutcome::failed(e.to_string(), query)
            }
        };

        let span = tracing::Span::current();
        if let SearchOutcome::Found { search_type, .. } = &outcome {
            span.record("search_type", search_type.as_str());
        }
        span.record("count", outcome.count());
        outcome
    }

    async fn try_search(&self, query: &str, limit: u32) -> Result<SearchOutcome, RepositoryError> {
        if self.store.count_items().await? == 0 {
            tracing::warn!("inventory is empty, skipping search");
            return Ok(SearchOutcome::empty_inventory());
        }

        let mut hits = self.store.vector_search(query, limit).await?;
        if !hits.is_empty() {
            hits.truncate(limit as usize);
            return Ok(SearchOutcome::found(SearchMode::Vector, query, hits));
        }

        tracing::info!("no semantic matches, falling back to text search");
        let mut items = self.store.text_search(query, limit).await?;
        items.truncate(limit as usize);
        let hits = items.into_iter().map(ScoredItem::text).collect();
        Ok(SearchOutcome::found(SearchMode::Text, query, hits))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use rust_decimal::Decimal;
    use shopchat_core::ItemPrices;

    use super::*;

    pub(crate) fn item(id: i32, name: &str, description: &str, categories: &[&str]) -> InventoryItem {
        InventoryItem {
            id: ItemId::new(id),
            item_id: format!("SKU-{id}"),
            name: name.to_string(),
            description: description.to_string(),
            brand: "Coastline".to_string(),
            manufacturer_address: None,
            prices: ItemPrices::new(Decimal::new(99_900, 2), Decimal::new(79_900, 2)),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            user_reviews: Vec::new(),
            notes: None,
            embedding_text: format!("{name} {description}"),
            created_at: Utc::now(),
        }
    }

    /// Store fake with scripted vector hits and a real substring text search.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        pub items: Vec<InventoryItem>,
        pub vector_hits: Vec<ScoredItem>,
        pub fail_vector: bool,
        pub vector_calls: AtomicUsize,
        pub text_calls: AtomicUsize,
        pub last_limit: Mutex<Option<u32>>,
    }

    #[async_trait]
    impl InventoryStore for FakeStore {
        async fn list_items(&self) -> Result<Vec<InventoryItem>, RepositoryError> {
            Ok(self.items.clone())
        }

        async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, RepositoryError> {
            Ok(self.items.iter().find(|i| i.id == id).cloned())
        }

        async fn count_items(&self) -> Result<i64, RepositoryError> {
            Ok(i64::try_from(self.items.len()).unwrap_or(i64::MAX))
        }

        async fn vector_search(&self, _query: &str, limit: u32) -> Result<Vec<ScoredItem>, RepositoryError> {
            self.vector_calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_limit.lock() {
                *last = Some(limit);
            }
            if self.fail_vector {
                return Err(RepositoryError::DataCorruption("index unavailable".to_string()));
            }
            Ok(self.vector_hits.clone())
        }

        async fn text_search(&self, query: &str, limit: u32) -> Result<Vec<InventoryItem>, RepositoryError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
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

    fn catalog() -> Vec<InventoryItem> {
        vec![
            item(1, "Harbor Sofa", "Navy blue velvet sofa", &["Sofas"]),
            item(2, "Oak Table", "Solid oak dining table", &["Tables"]),
            item(3, "Loft Sofa", "Grey linen sofa", &["Sofas"]),
        ]
    }

    fn gateway(store: FakeStore) -> (InventorySearch, Arc<FakeStore>) {
        let store = Arc::new(store);
        (InventorySearch::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_empty_inventory_skips_search() {
        let (search, store) = gateway(FakeStore::default());

        let outcome = search.search("anything at all", 5).await;

        assert!(matches!(outcome, SearchOutcome::EmptyInventory { count: 0, .. }));
        assert!(outcome.is_error());
        assert_eq!(store.vector_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_semantic_hits_are_tagged_vector() {
        let items = catalog();
        let hits: Vec<ScoredItem> = items
            .iter()
            .take(2)
            .map(|i| ScoredItem::semantic(i.clone(), 0.8))
            .collect();
        let (search, store) = gateway(FakeStore {
            items,
            vector_hits: hits,
            ..FakeStore::default()
        });

        let outcome = search.search("comfy couch", 2).await;

        match &outcome {
            SearchOutcome::Found {
                search_type,
                count,
                query,
                ..
            } => {
                assert_eq!(*search_type, SearchMode::Vector);
                assert!(*count <= 2);
                assert_eq!(query, "comfy couch");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(*store.last_limit.lock().expect("lock"), Some(2));
        assert_eq!(store.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vector_results_never_exceed_limit() {
        let items = catalog();
        let hits = items.iter().map(|i| ScoredItem::semantic(i.clone(), 0.9)).collect();
        let (search, _) = gateway(FakeStore {
            items,
            vector_hits: hits,
            ..FakeStore::default()
        });

        assert_eq!(search.search("sofa", 1).await.count(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_text_search() {
        let (search, store) = gateway(FakeStore {
            items: catalog(),
            ..FakeStore::default()
        });

        let outcome = search.search("SOFA", 10).await;

        match &outcome {
            SearchOutcome::Found {
                search_type,
                count,
                results,
                ..
            } => {
                assert_eq!(*search_type, SearchMode::Text);
                assert_eq!(*count, 2);
                assert!(results.iter().all(|r| r.score.is_none()));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(store.vector_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_fallback_matches_categories() {
        let (search, _) = gateway(FakeStore {
            items: catalog(),
            ..FakeStore::default()
        });

        assert_eq!(search.search("tables", 10).await.count(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_becomes_payload() {
        let (search, _) = gateway(FakeStore {
            items: catalog(),
            fail_vector: true,
            ..FakeStore::default()
        });

        let outcome = search.search("sofa", 10).await;

        match &outcome {
            SearchOutcome::Failed { error, message, query } => {
                assert_eq!(error, "Search failed");
                assert!(message.contains("index unavailable"));
                assert_eq!(query, "sofa");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_outcome_json_shape() {
        let found = SearchOutcome::found(SearchMode::Text, "lamp", Vec::new()).to_json();
        assert_eq!(found["status"], "found");
        assert_eq!(found["searchType"], "text");
        assert_eq!(found["count"], 0);

        let empty = SearchOutcome::empty_inventory().to_json();
        assert_eq!(empty["status"], "empty_inventory");
        assert_eq!(empty["count"], 0);
        assert_eq!(empty["error"], "No items found in inventory");

        let failed = SearchOutcome::failed("timeout", "lamp").to_json();
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["query"], "lamp");
    }
}
