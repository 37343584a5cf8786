//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! pinkaura migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (or `SUPABASE_DB_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in the
//! binary at build time.

use pinkaura_storefront::db;

use super::{CliError, database_url};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    db::MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
