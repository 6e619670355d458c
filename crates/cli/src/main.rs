//! Stride CLI - Database migrations, catalog seeding and maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! stride-cli migrate
//!
//! # Load (or update) the catalog from YAML
//! stride-cli seed seed/catalog.yaml
//!
//! # Replace the catalog entirely
//! stride-cli seed seed/catalog.yaml --clear
//!
//! # Delete expired guest sessions and their carts
//! stride-cli guests prune
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stride-cli")]
#[command(author, version, about = "Stride CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog from a YAML file
    Seed {
        /// Path to the catalog YAML file
        file: String,

        /// Empty the catalog (and everything referencing it) first
        #[arg(long)]
        clear: bool,
    },
    /// Manage guest sessions
    Guests {
        #[command(subcommand)]
        action: GuestAction,
    },
}

#[derive(Subcommand)]
enum GuestAction {
    /// Delete expired guest sessions and their carts
    Prune,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file, clear } => commands::seed::catalog(&file, clear).await?,
        Commands::Guests { action } => match action {
            GuestAction::Prune => commands::guests::prune().await?,
        },
    }
    Ok(())
}
