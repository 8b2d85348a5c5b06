//! shopchat CLI - database migrations and inventory management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! shopchat-cli migrate
//!
//! # Load inventory items (JSON or YAML), replacing what is there
//! shopchat-cli seed data/furniture.json --clear
//!
//! # Show inventory and conversation counts
//! shopchat-cli stats
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Embed and upsert inventory items from a file
//! - `stats` - Print inventory size and conversation thread count

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopchat-cli")]
#[command(author, version, about = "shopchat CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the inventory from a JSON or YAML file
    Seed {
        /// Path to the inventory file (an array of items)
        file: PathBuf,

        /// Delete existing inventory items first
        #[arg(long)]
        clear: bool,
    },
    /// Show inventory and conversation statistics
    Stats,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file, clear } => commands::seed::inventory(&file, clear).await?,
        Commands::Stats => commands::stats::run().await?,
    }
    Ok(())
}
