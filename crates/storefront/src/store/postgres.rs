//! Postgres backend.
//!
//! Stock commits lock the affected product rows, so unlike the document
//! backends concurrent checkouts serialize on the database.

use chrono::{DateTime, Utc};
use pinkaura_core::{
    NewOrder, NewOrderItem, NewProduct, Order, OrderId, OrderItem, OrderStatus, Product,
    ProductId, StockDecrement,
};
use sqlx::PgPool;
use tracing::instrument;

use super::{CatalogSnapshot, StoreError, content_revision};
use crate::db::{OrderRepository, ProductRepository};

/// Products and orders in `PostgreSQL`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    const fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(&self.pool)
    }

    const fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(&self.pool)
    }

    pub(super) async fn load_catalog(&self) -> Result<CatalogSnapshot, StoreError> {
        let products = self.products().list().await?;
        let revision = content_revision(&products)?;
        Ok(CatalogSnapshot { products, revision })
    }

    pub(super) async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.products().get(id).await
    }

    #[instrument(skip(self, new, image_url, cloudinary_id))]
    pub(super) async fn create_product(
        &self,
        new: NewProduct,
        image_url: String,
        cloudinary_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        // id is assigned by the sequence
        let draft = new.into_product(ProductId::new(0), image_url, cloudinary_id, now);
        self.products().insert(draft).await
    }

    #[instrument(skip(self))]
    pub(super) async fn delete_product(&self, id: ProductId) -> Result<Product, StoreError> {
        self.products().delete(id).await
    }

    #[instrument(skip(self, products), fields(count = products.len()))]
    pub(super) async fn replace_catalog(
        &self,
        products: &[Product],
        revision: &str,
    ) -> Result<String, StoreError> {
        self.products().replace_all(products, revision).await
    }

    #[instrument(skip(self, decrements), fields(lines = decrements.len()))]
    pub(super) async fn commit_stock(
        &self,
        decrements: &[StockDecrement],
    ) -> Result<Vec<Product>, StoreError> {
        self.products().decrement_stock(decrements).await
    }

    pub(super) async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.orders().insert(order).await
    }

    pub(super) async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        self.orders().insert_items(order_id, items).await
    }

    pub(super) async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
        self.orders().delete(order_id).await
    }

    pub(super) async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.orders().list().await
    }

    pub(super) async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.orders().get(id).await
    }

    pub(super) async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        self.orders().update_status(id, status).await
    }
}
