//! Application state shared across handlers.

use std::sync::Arc;

use crate::agent::{Agent, InventoryStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Collaborators are built once
/// at startup and passed in, so tests can substitute in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    inventory: Arc<dyn InventoryStore>,
    agent: Agent,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `inventory` - Catalog reads for the product routes and readiness check
    /// * `agent` - The shopping assistant behind the chat routes
    #[must_use]
    pub fn new(inventory: Arc<dyn InventoryStore>, agent: Agent) -> Self {
        Self {
            inner: Arc::new(AppStateInner { inventory, agent }),
        }
    }

    /// Get a reference to the inventory store.
    #[must_use]
    pub fn inventory(&self) -> &dyn InventoryStore {
        self.inner.inventory.as_ref()
    }

    /// Get a reference to the shopping assistant.
    #[must_use]
    pub fn agent(&self) -> &Agent {
        &self.inner.agent
    }
}
