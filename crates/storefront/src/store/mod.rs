//! Catalog and order persistence.
//!
//! Three interchangeable backends hold the authoritative product list and
//! the order records:
//!
//! - [`GitHubStore`] - JSON files in a GitHub repository, read and written
//!   through the Contents API. Every write carries the blob `sha` it read, so
//!   GitHub rejects a write based on a stale copy.
//! - [`PgStore`] - `products`, `orders` and `order_items` tables.
//! - [`JsonFileStore`] - JSON files on local disk.
//!
//! None of them provide an idempotency key or a lock spanning the whole
//! order flow. Two checkouts racing for the last unit can both pass
//! validation; the loser fails when its stock commit re-checks.

pub mod file;
pub mod github;
pub mod postgres;

use chrono::Utc;
use pinkaura_core::{
    CheckoutError, NewOrder, NewOrderItem, NewProduct, Order, OrderId, OrderItem, OrderStatus,
    Product, ProductId, StockDecrement,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use file::JsonFileStore;
pub use github::{GitHubClient, GitHubError, GitHubStore};
pub use postgres::PgStore;

use crate::config::BackendConfig;

/// Errors from any store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored data could not be interpreted.
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A document already holds the largest representable id.
    #[error("No {0} ids left")]
    IdsExhausted(&'static str),

    /// The revision token supplied with a write is stale.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stock ran out between validation and commit.
    #[error(transparent)]
    Stock(CheckoutError),
}

/// The product list together with the revision token it was read at.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub products: Vec<Product>,
    /// Blob `sha` on GitHub, a content hash elsewhere.
    pub revision: String,
}

/// The configured backend.
#[derive(Clone)]
pub enum CatalogStore {
    GitHub(GitHubStore),
    Postgres(PgStore),
    File(JsonFileStore),
}

impl CatalogStore {
    /// Open the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the Postgres pool cannot connect, or
    /// `StoreError::GitHub` if the HTTP client cannot be built.
    pub async fn connect(config: &BackendConfig) -> Result<Self, StoreError> {
        match config {
            BackendConfig::GitHub(github) => {
                Ok(Self::GitHub(GitHubStore::new(GitHubClient::new(github)?)))
            }
            BackendConfig::Postgres { database_url } => {
                let pool = crate::db::create_pool(database_url).await?;
                Ok(Self::Postgres(PgStore::new(pool)))
            }
            BackendConfig::File(file) => {
                if file.ephemeral {
                    tracing::warn!(
                        products_file = %file.products_file.display(),
                        "Local file storage on an ephemeral disk: products and orders are lost on restart"
                    );
                }
                Ok(Self::File(JsonFileStore::new(
                    file.products_file.clone(),
                    file.orders_file.clone(),
                )))
            }
        }
    }

    /// Short name used in logs and the health endpoint.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::GitHub(_) => "github",
            Self::Postgres(_) => "postgres",
            Self::File(_) => "file",
        }
    }

    /// Load the full product list.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend cannot be read or holds invalid data.
    pub async fn load_catalog(&self) -> Result<CatalogSnapshot, StoreError> {
        match self {
            Self::GitHub(store) => store.load_catalog().await,
            Self::Postgres(store) => store.load_catalog().await,
            Self::File(store) => store.load_catalog().await,
        }
    }

    /// Look up one product.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend cannot be read.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        match self {
            Self::Postgres(store) => store.get_product(id).await,
            Self::GitHub(_) | Self::File(_) => Ok(self
                .load_catalog()
                .await?
                .products
                .into_iter()
                .find(|p| p.id == id)),
        }
    }

    /// Store a new product built from an admin submission and its uploaded image.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    pub async fn create_product(
        &self,
        new: NewProduct,
        image_url: String,
        cloudinary_id: Option<String>,
    ) -> Result<Product, StoreError> {
        let now = Utc::now();
        match self {
            Self::GitHub(store) => store.create_product(new, image_url, cloudinary_id, now).await,
            Self::Postgres(store) => store.create_product(new, image_url, cloudinary_id, now).await,
            Self::File(store) => store.create_product(new, image_url, cloudinary_id, now).await,
        }
    }

    /// Remove a product and return it so its media can be cleaned up.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no product has `id`.
    pub async fn delete_product(&self, id: ProductId) -> Result<Product, StoreError> {
        match self {
            Self::GitHub(store) => store.delete_product(id).await,
            Self::Postgres(store) => store.delete_product(id).await,
            Self::File(store) => store.delete_product(id).await,
        }
    }

    /// Overwrite the whole catalog, provided nothing changed since `revision`
    /// was read. Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if `revision` is stale.
    pub async fn replace_catalog(
        &self,
        products: &[Product],
        revision: &str,
    ) -> Result<String, StoreError> {
        match self {
            Self::GitHub(store) => store.replace_catalog(products, revision).await,
            Self::Postgres(store) => store.replace_catalog(products, revision).await,
            Self::File(store) => store.replace_catalog(products, revision).await,
        }
    }

    /// Apply stock decrements to the current catalog.
    ///
    /// Stock is re-checked against what the backend holds now; if any
    /// variant ran short nothing is written. Not retried. Returns the
    /// updated products.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Stock` if stock ran out since validation,
    /// `StoreError::Conflict` if GitHub rejected a stale write, or another
    /// `StoreError` if the write failed.
    pub async fn commit_stock(
        &self,
        decrements: &[StockDecrement],
    ) -> Result<Vec<Product>, StoreError> {
        match self {
            Self::GitHub(store) => store.commit_stock(decrements).await,
            Self::Postgres(store) => store.commit_stock(decrements).await,
            Self::File(store) => store.commit_stock(decrements).await,
        }
    }

    /// Record a new order without items.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    pub async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        match self {
            Self::GitHub(store) => store.insert_order(order).await,
            Self::Postgres(store) => store.insert_order(order).await,
            Self::File(store) => store.insert_order(order).await,
        }
    }

    /// Attach line items to a recorded order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order is gone, or another
    /// `StoreError` if the write fails.
    pub async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        match self {
            Self::GitHub(store) => store.insert_order_items(order_id, items).await,
            Self::Postgres(store) => store.insert_order_items(order_id, items).await,
            Self::File(store) => store.insert_order_items(order_id, items).await,
        }
    }

    /// Remove an order; used to undo a half-recorded order.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails. Deleting a missing order is
    /// not an error.
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
        match self {
            Self::GitHub(store) => store.delete_order(order_id).await,
            Self::Postgres(store) => store.delete_order(order_id).await,
            Self::File(store) => store.delete_order(order_id).await,
        }
    }

    /// All orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend cannot be read.
    pub async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders = match self {
            Self::GitHub(store) => store.list_orders().await?,
            Self::Postgres(store) => store.list_orders().await?,
            Self::File(store) => store.list_orders().await?,
        };
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    /// One order with its items.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend cannot be read.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        match self {
            Self::Postgres(store) => store.get_order(id).await,
            Self::GitHub(_) | Self::File(_) => {
                Ok(self.list_orders().await?.into_iter().find(|o| o.id == id))
            }
        }
    }

    /// Change an order's status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no order has `id`.
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        match self {
            Self::GitHub(store) => store.update_order_status(id, status).await,
            Self::Postgres(store) => store.update_order_status(id, status).await,
            Self::File(store) => store.update_order_status(id, status).await,
        }
    }
}

/// Revision token for backends without one of their own: SHA-256 of the
/// catalog's JSON form.
///
/// # Errors
///
/// Returns `StoreError::Json` if the products cannot be serialized.
pub fn content_revision(products: &[Product]) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(products)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Parse a products JSON document.
///
/// # Errors
///
/// Returns `StoreError::DataCorruption` naming `source` if the document is
/// not a product array.
pub fn parse_products(bytes: &[u8], source: &str) -> Result<Vec<Product>, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::DataCorruption(format!("{source} is not a product list: {e}")))
}

/// Parse an orders JSON document.
///
/// # Errors
///
/// Returns `StoreError::DataCorruption` naming `source` if the document is
/// not an order array.
pub fn parse_orders(bytes: &[u8], source: &str) -> Result<Vec<Order>, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::DataCorruption(format!("{source} is not an order list: {e}")))
}

/// Serialize a JSON document the way the catalog files are kept: pretty,
/// two-space indent, trailing newline.
///
/// # Errors
///
/// Returns `StoreError::Json` if serialization fails.
pub fn to_pretty_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

// =============================================================================
// Shared list operations for the document backends (GitHub, file)
// =============================================================================

pub(crate) mod documents {
    use chrono::{DateTime, Utc};
    use pinkaura_core::{
        NewOrder, NewOrderItem, NewProduct, Order, OrderId, OrderItem, OrderStatus, Product,
        ProductId, apply_decrements, next_order_id, next_order_item_id, next_product_id,
    };

    use super::StoreError;
    use pinkaura_core::StockDecrement;

    pub fn add_product(
        products: &mut Vec<Product>,
        new: NewProduct,
        image_url: String,
        cloudinary_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let id = next_product_id(products).ok_or(StoreError::IdsExhausted("product"))?;
        let product = new.into_product(id, image_url, cloudinary_id, now);
        products.push(product.clone());
        Ok(product)
    }

    pub fn remove_product(products: &mut Vec<Product>, id: ProductId) -> Result<Product, StoreError> {
        let position = products
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Product {id}")))?;
        Ok(products.remove(position))
    }

    pub fn decrement(
        products: &mut [Product],
        decrements: &[StockDecrement],
    ) -> Result<Vec<Product>, StoreError> {
        let touched = apply_decrements(products, decrements).map_err(StoreError::Stock)?;
        Ok(products
            .iter()
            .filter(|p| touched.contains(&p.id))
            .cloned()
            .collect())
    }

    pub fn add_order(orders: &mut Vec<Order>, order: NewOrder) -> Result<Order, StoreError> {
        let id = next_order_id(orders).ok_or(StoreError::IdsExhausted("order"))?;
        let order = order.into_order(id);
        orders.push(order.clone());
        Ok(order)
    }

    pub fn add_items(
        orders: &mut [Order],
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let mut next_id = next_order_item_id(orders);
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| StoreError::NotFound(format!("Order {order_id}")))?;
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let id = next_id.ok_or(StoreError::IdsExhausted("order item"))?;
            let item = item.into_item(id, order_id);
            next_id = id.next();
            stored.push(item);
        }
        order.items.extend(stored.iter().cloned());
        Ok(stored)
    }

    /// Returns whether an order was removed.
    pub fn remove_order(orders: &mut Vec<Order>, order_id: OrderId) -> bool {
        let before = orders.len();
        orders.retain(|o| o.id != order_id);
        orders.len() != before
    }

    pub fn set_status(
        orders: &mut [Order],
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| StoreError::NotFound(format!("Order {order_id}")))?;
        order.status = status;
        Ok(order.clone())
    }
}
