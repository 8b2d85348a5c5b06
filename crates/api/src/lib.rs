//! shopchat API library.
//!
//! A furniture-store chatbot: a tool-using Claude agent that answers shopper
//! questions from a pgvector-backed inventory, behind a small axum JSON API.
//! The binary in `main.rs` wires the production collaborators; everything is
//! exposed here so integration tests can drive the router with fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod agent;
pub mod claude;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
