//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};

use shopchat_core::ItemId;

use crate::error::{AppError, Result};
use crate::models::InventoryItem;
use crate::state::AppState;

/// List every inventory item.
///
/// GET /products
#[tracing::instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<InventoryItem>>> {
    let items = state.inventory().list_items().await?;
    tracing::debug!(count = items.len(), "listed products");
    Ok(Json(items))
}

/// Show one inventory item.
///
/// GET /products/{id}
///
/// Ids that are not integers cannot exist, so they are reported as missing.
#[tracing::instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<InventoryItem>> {
    let not_found = || AppError::NotFound("Product".to_string());

    let id: ItemId = id.parse().map_err(|_| not_found())?;
    let item = state.inventory().get_item(id).await?.ok_or_else(not_found)?;

    Ok(Json(item))
}
