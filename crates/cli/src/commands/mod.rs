//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod stats;

use secrecy::SecretString;

/// Database URL from `SHOPCHAT_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, Box<dyn std::error::Error>> {
    std::env::var("SHOPCHAT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "SHOPCHAT_DATABASE_URL (or DATABASE_URL) not set".into())
}
