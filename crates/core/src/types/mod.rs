//! Core types for shopchat.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod role;
pub mod thread;

pub use id::*;
pub use price::ItemPrices;
pub use role::ChatRole;
pub use thread::{ThreadId, ThreadIdError};
