//! Shopchat Core - Shared domain types.
//!
//! This crate provides the types shared by the shopchat components:
//! - `api` - HTTP facade and the tool-using agent loop
//! - `cli` - Command-line tools for migrations and inventory seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for item IDs, thread IDs, prices and chat roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
