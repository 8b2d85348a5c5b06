//! Domain models for the shopping assistant.

pub mod conversation;
pub mod inventory;

pub use conversation::{Message, ToolCall};
pub use inventory::{InventoryItem, ManufacturerAddress, NewInventoryItem, ScoredItem, UserReview};
