//! Inventory domain models.
//!
//! Items are read-only from the assistant's point of view; they are written
//! only by the seeding CLI.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopchat_core::{ItemId, ItemPrices};

/// A furniture item in the store inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Database ID (used by `GET /products/{id}`).
    pub id: ItemId,
    /// Catalog SKU.
    pub item_id: String,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub manufacturer_address: Option<ManufacturerAddress>,
    pub prices: ItemPrices,
    pub categories: Vec<String>,
    pub user_reviews: Vec<UserReview>,
    pub notes: Option<String>,
    /// Text the item embedding was computed from.
    pub embedding_text: String,
    pub created_at: DateTime<Utc>,
}

/// Manufacturer postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// A customer review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReview {
    pub review_date: String,
    pub rating: u8,
    pub comment: String,
}

/// An inventory search hit.
///
/// `score` is the cosine similarity for semantic matches and absent for
/// text-fallback matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: InventoryItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ScoredItem {
    #[must_use]
    pub const fn semantic(item: InventoryItem, score: f64) -> Self {
        Self {
            item,
            score: Some(score),
        }
    }

    #[must_use]
    pub const fn text(item: InventoryItem) -> Self {
        Self { item, score: None }
    }
}

/// An item to be inserted by the seeding tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub item_id: String,
    pub name: String,
    pub description: String,
    pub brand: String,
    #[serde(default)]
    pub manufacturer_address: Option<ManufacturerAddress>,
    pub prices: ItemPrices,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub user_reviews: Vec<UserReview>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Overrides the generated embedding text when present.
    #[serde(default)]
    pub embedding_text: Option<String>,
}

impl NewInventoryItem {
    /// The text to embed for this item: the explicit override, or a summary
    /// of every searchable attribute.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        self.embedding_text
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.summary())
    }

    fn summary(&self) -> String {
        let mut text = format!("{}: {} Brand: {}.", self.name, self.description, self.brand);

        if let Some(address) = &self.manufacturer_address {
            let _ = write!(text, " Made in {}, {}.", address.city, address.country);
        }

        if self.prices.is_on_sale() {
            let _ = write!(
                text,
                " Price: {} on sale, {} off the full price of {}.",
                self.prices.effective(),
                self.prices.discount(),
                self.prices.full_price
            );
        } else {
            let _ = write!(text, " Price: {}.", self.prices.effective());
        }

        if !self.categories.is_empty() {
            let _ = write!(text, " Categories: {}.", self.categories.join(", "));
        }

        if !self.user_reviews.is_empty() {
            let reviews: Vec<String> = self
                .user_reviews
                .iter()
                .map(|r| format!("{}/5 \"{}\"", r.rating, r.comment))
                .collect();
            let _ = write!(text, " Reviews: {}.", reviews.join("; "));
        }

        if let Some(notes) = self.notes.as_deref().filter(|n| !n.is_empty()) {
            let _ = write!(text, " Notes: {notes}");
        }

        text
    }
}
