//! Pinkaura CLI - Database migrations and catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! pinkaura migrate
//!
//! # Validate a catalog file
//! pinkaura catalog check public/data/products.json
//!
//! # Move a catalog between a JSON file and Postgres
//! pinkaura catalog import public/data/products.json
//! pinkaura catalog export products.json
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `catalog check|import|export` - Catalog file management

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pinkaura")]
#[command(author, version, about = "Pinkaura CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Check, import and export catalog files
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate a products JSON file
    Check {
        /// Path to the products file
        file: PathBuf,
    },
    /// Replace the Postgres catalog with a products JSON file
    Import {
        /// Path to the products file
        file: PathBuf,

        /// Import even if the file has blocking issues
        #[arg(long)]
        force: bool,
    },
    /// Write the Postgres catalog to a products JSON file
    Export {
        /// Destination path
        file: PathBuf,
    },
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

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Catalog { action } => match action {
            CatalogAction::Check { file } => commands::catalog::check(&file).await?,
            CatalogAction::Import { file, force } => {
                commands::catalog::import(&file, force).await?;
            }
            CatalogAction::Export { file } => commands::catalog::export(&file).await?,
        },
    }
    Ok(())
}
