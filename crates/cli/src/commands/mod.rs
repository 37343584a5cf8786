//! CLI subcommand implementations.

pub mod catalog;
pub mod migrate;

use secrecy::SecretString;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Catalog read or write failed.
    #[error("Store error: {0}")]
    Store(#[from] pinkaura_storefront::store::StoreError),

    /// File could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Catalog file failed its checks.
    #[error("{0} problem(s) found in the catalog")]
    InvalidCatalog(usize),
}

/// Postgres connection string from `DATABASE_URL` or `SUPABASE_DB_URL`.
fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();

    std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("SUPABASE_DB_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("DATABASE_URL"))
}
