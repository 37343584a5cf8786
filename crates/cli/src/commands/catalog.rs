//! Catalog file commands.
//!
//! # Usage
//!
//! ```bash
//! # Validate a products.json before committing it
//! pinkaura catalog check public/data/products.json
//!
//! # Load a products.json into Postgres (replaces every product)
//! pinkaura catalog import public/data/products.json
//!
//! # Write the Postgres catalog out as products.json
//! pinkaura catalog export products.json
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (or `SUPABASE_DB_URL`) - for `import` and `export`

use std::path::Path;

use pinkaura_core::{CatalogIssue, Product, check_catalog};
use pinkaura_storefront::db::{self, ProductRepository};
use pinkaura_storefront::store::{content_revision, parse_products, to_pretty_json};
use tracing::{error, info, warn};

use super::{CliError, database_url};

/// Read and parse a products file.
async fn read_products(path: &Path) -> Result<Vec<Product>, CliError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_products(&bytes, &path.display().to_string())?)
}

/// Log every issue and return how many block the catalog.
fn report(issues: &[CatalogIssue]) -> usize {
    let mut blocking = 0;
    for issue in issues {
        if issue.is_blocking() {
            blocking += 1;
            error!("  - {issue}");
        } else {
            warn!("  - {issue}");
        }
    }
    blocking
}

/// Check a products file.
///
/// # Errors
///
/// Returns `CliError::InvalidCatalog` if any blocking issue is found, or an
/// error if the file cannot be read or parsed.
pub async fn check(path: &Path) -> Result<(), CliError> {
    let products = read_products(path).await?;
    info!(products = products.len(), path = %path.display(), "Checking catalog");

    let issues = check_catalog(&products);
    let blocking = report(&issues);
    if blocking > 0 {
        return Err(CliError::InvalidCatalog(blocking));
    }

    info!(warnings = issues.len(), "Catalog OK");
    Ok(())
}

/// Replace the Postgres catalog with the contents of a products file.
///
/// Product ids are kept so carts and orders referring to them stay valid.
///
/// # Errors
///
/// Returns `CliError::InvalidCatalog` if the file has blocking issues and
/// `force` is not set, or an error if the database write fails.
pub async fn import(path: &Path, force: bool) -> Result<(), CliError> {
    let products = read_products(path).await?;

    let blocking = report(&check_catalog(&products));
    if blocking > 0 && !force {
        return Err(CliError::InvalidCatalog(blocking));
    }

    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let repo = ProductRepository::new(&pool);

    let current = repo.list().await?;
    let revision = content_revision(&current)?;
    info!(
        replacing = current.len(),
        importing = products.len(),
        "Importing catalog"
    );

    let revision = repo.replace_all(&products, &revision).await?;
    info!(revision = %revision, "Catalog imported");
    Ok(())
}

/// Write the Postgres catalog to a products file.
///
/// # Errors
///
/// Returns an error if the database read or the file write fails.
pub async fn export(path: &Path) -> Result<(), CliError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let products = ProductRepository::new(&pool).list().await?;
    let bytes = to_pretty_json(&products)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;

    info!(products = products.len(), path = %path.display(), "Catalog exported");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    /// A catalog file whose directory is deleted when the test ends.
    struct CatalogFile {
        dir: PathBuf,
        path: PathBuf,
    }

    impl Drop for CatalogFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    async fn write_catalog(name: &str, json: &str) -> CatalogFile {
        let dir = std::env::temp_dir().join(format!(
            "pinkaura-cli-{name}-{}",
            std::process::id()
        ));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("products.json");
        tokio::fs::write(&path, json).await.unwrap();
        CatalogFile { dir, path }
    }

    #[tokio::test]
    async fn test_check_accepts_hidden_variant() {
        let file = write_catalog(
            "hidden-variant",
            r#"[{"id": 1, "name": "Rose Ring", "price": 500, "category": "Rings",
                 "variants": [
                   {"color": "Gold", "stock": 5, "images": ["https://img/1.jpg"]},
                   {"color": "Silver", "stock": 2, "images": []}
                 ]}]"#,
        )
        .await;

        assert!(check(&file.path).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_rejects_duplicate_ids() {
        let file = write_catalog(
            "duplicate-ids",
            r#"[{"id": 1, "name": "Rose Ring", "price": 500,
                 "variants": [{"color": "Gold", "stock": 5, "images": ["a.jpg"]}]},
                {"id": 1, "name": "Pearl Studs", "price": 350,
                 "variants": [{"color": "White", "stock": 1, "images": ["b.jpg"]}]}]"#,
        )
        .await;

        let err = check(&file.path).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidCatalog(1)));
    }

    #[tokio::test]
    async fn test_check_reports_unparseable_file() {
        let file = write_catalog("not-a-list", r#"{"products": []}"#).await;
        let err = check(&file.path).await.unwrap_err();
        assert!(matches!(err, CliError::Store(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("pinkaura-cli-does-not-exist/products.json");
        let err = check(&path).await.unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
