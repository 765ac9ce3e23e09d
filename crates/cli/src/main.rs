//! Food Delivery CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! fd-cli migrate
//!
//! # Seed the embedded demo catalog and demo user
//! fd-cli seed
//!
//! # Seed from another catalog file
//! fd-cli seed --file crates/server/seed/catalog.yaml
//!
//! # Show outbox delivery counts
//! fd-cli status
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Insert restaurants, menus and the demo user
//! - `status` - Outbox event counts by delivery state

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fd-cli")]
#[command(author, version, about = "Food delivery order service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed restaurants, menus and the demo user
    Seed {
        /// Catalog YAML file (defaults to the built-in catalog)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show outbox delivery counts
    Status,
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
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(file.as_deref()).await?,
        Commands::Status => commands::status::run().await?,
    }
    Ok(())
}
