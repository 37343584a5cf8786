//! Local JSON file backend.
//!
//! Products and orders each live in one pretty-printed JSON array. Writes go
//! to a temporary file that is renamed over the original, and a process-wide
//! lock serializes read-modify-write cycles within this server. Nothing
//! coordinates with other processes editing the same files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pinkaura_core::{
    NewOrder, NewOrderItem, NewProduct, Order, OrderId, OrderItem, OrderStatus, Product,
    ProductId, StockDecrement,
};
use tokio::sync::Mutex;
use tracing::instrument;

use super::{
    CatalogSnapshot, StoreError, content_revision, documents, parse_orders, parse_products,
    to_pretty_json,
};

/// Products and orders kept in local JSON files.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<Inner>,
}

struct Inner {
    products_file: PathBuf,
    orders_file: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(products_file: PathBuf, orders_file: PathBuf) -> Self {
        Self {
            inner: Arc::new(Inner {
                products_file,
                orders_file,
                write_lock: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn products_file(&self) -> &Path {
        &self.inner.products_file
    }

    async fn read_products(&self) -> Result<Vec<Product>, StoreError> {
        match read_optional(&self.inner.products_file).await? {
            Some(bytes) => parse_products(&bytes, &self.inner.products_file.display().to_string()),
            None => Ok(Vec::new()),
        }
    }

    async fn read_orders(&self) -> Result<Vec<Order>, StoreError> {
        match read_optional(&self.inner.orders_file).await? {
            Some(bytes) => parse_orders(&bytes, &self.inner.orders_file.display().to_string()),
            None => Ok(Vec::new()),
        }
    }

    async fn write_products(&self, products: &[Product]) -> Result<(), StoreError> {
        write_atomic(&self.inner.products_file, &to_pretty_json(products)?).await
    }

    async fn write_orders(&self, orders: &[Order]) -> Result<(), StoreError> {
        write_atomic(&self.inner.orders_file, &to_pretty_json(orders)?).await
    }

    pub(super) async fn load_catalog(&self) -> Result<CatalogSnapshot, StoreError> {
        let products = self.read_products().await?;
        let revision = content_revision(&products)?;
        Ok(CatalogSnapshot { products, revision })
    }

    #[instrument(skip(self, new, image_url, cloudinary_id))]
    pub(super) async fn create_product(
        &self,
        new: NewProduct,
        image_url: String,
        cloudinary_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut products = self.read_products().await?;
        let product = documents::add_product(&mut products, new, image_url, cloudinary_id, now)?;
        self.write_products(&products).await?;
        Ok(product)
    }

    #[instrument(skip(self))]
    pub(super) async fn delete_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut products = self.read_products().await?;
        let removed = documents::remove_product(&mut products, id)?;
        self.write_products(&products).await?;
        Ok(removed)
    }

    #[instrument(skip(self, products), fields(count = products.len()))]
    pub(super) async fn replace_catalog(
        &self,
        products: &[Product],
        revision: &str,
    ) -> Result<String, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let current = content_revision(&self.read_products().await?)?;
        if current != revision {
            return Err(StoreError::Conflict(format!(
                "{} changed since revision {revision}",
                self.inner.products_file.display()
            )));
        }
        self.write_products(products).await?;
        content_revision(products)
    }

    #[instrument(skip(self, decrements), fields(lines = decrements.len()))]
    pub(super) async fn commit_stock(
        &self,
        decrements: &[StockDecrement],
    ) -> Result<Vec<Product>, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut products = self.read_products().await?;
        let updated = documents::decrement(&mut products, decrements)?;
        self.write_products(&products).await?;
        Ok(updated)
    }

    pub(super) async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut orders = self.read_orders().await?;
        let order = documents::add_order(&mut orders, order)?;
        self.write_orders(&orders).await?;
        Ok(order)
    }

    pub(super) async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut orders = self.read_orders().await?;
        let stored = documents::add_items(&mut orders, order_id, items)?;
        self.write_orders(&orders).await?;
        Ok(stored)
    }

    pub(super) async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut orders = self.read_orders().await?;
        if documents::remove_order(&mut orders, order_id) {
            self.write_orders(&orders).await?;
        }
        Ok(())
    }

    pub(super) async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.read_orders().await
    }

    pub(super) async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut orders = self.read_orders().await?;
        let order = documents::set_status(&mut orders, id, status)?;
        self.write_orders(&orders).await?;
        Ok(order)
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
