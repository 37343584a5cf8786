//! Product repository for database operations.
//!
//! Variants are stored as a `jsonb` array on the product row so the shape
//! matches the JSON document backends exactly.

use chrono::{DateTime, Utc};
use pinkaura_core::{Product, ProductId, StockDecrement, Variant};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::store::{StoreError, content_revision, documents};

const PRODUCT_COLUMNS: &str = "id, name, price, category, description, trending, best_seller, \
                               cloudinary_id, variants, created_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: Decimal,
    category: String,
    description: String,
    trending: bool,
    best_seller: bool,
    cloudinary_id: Option<String>,
    variants: Json<Vec<Variant>>,
    created_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price.into(),
            category: row.category,
            description: row.description,
            trending: row.trending,
            best_seller: row.best_seller,
            cloudinary_id: row.cloudinary_id,
            variants: row.variants.0,
            created_at: row.created_at,
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All products in id order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.as_i64())
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(Product::from))
    }

    /// Insert a product and return it with its assigned id. `product.id` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the insert fails.
    pub async fn insert(&self, mut product: Product) -> Result<Product, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO products
                (name, price, category, description, trending, best_seller,
                 cloudinary_id, variants, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.trending)
        .bind(product.best_seller)
        .bind(product.cloudinary_id.as_deref())
        .bind(Json(&product.variants))
        .bind(product.created_at)
        .fetch_one(self.pool)
        .await?;

        product.id = ProductId::new(id);
        Ok(product)
    }

    /// Delete a product, returning the removed row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no product has `id`.
    pub async fn delete(&self, id: ProductId) -> Result<Product, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::from)
            .ok_or_else(|| StoreError::NotFound(format!("Product {id}")))
    }

    /// Replace every product, keeping their ids, if the table still hashes to
    /// `revision`. Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the catalog changed since `revision`.
    pub async fn replace_all(
        &self,
        products: &[Product],
        revision: &str,
    ) -> Result<String, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("LOCK TABLE products IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
                .fetch_all(&mut *tx)
                .await?;
        let current: Vec<Product> = rows.into_iter().map(Product::from).collect();
        if content_revision(&current)? != revision {
            return Err(StoreError::Conflict(format!(
                "products table changed since revision {revision}"
            )));
        }

        sqlx::query("DELETE FROM products").execute(&mut *tx).await?;
        for product in products {
            insert_with_id(&mut tx, product).await?;
        }
        sqlx::query(
            r"
            SELECT setval(
                pg_get_serial_sequence('products', 'id'),
                COALESCE((SELECT MAX(id) FROM products), 0) + 1,
                false
            )
            ",
        )
        .execute(&mut *tx)
        .await?;

        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await?;

        let stored: Vec<Product> = rows.into_iter().map(Product::from).collect();
        content_revision(&stored)
    }

    /// Decrement stock inside one transaction, locking the affected rows.
    /// Nothing is written if any variant is short.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Stock` if a product, variant or enough stock is
    /// missing.
    pub async fn decrement_stock(
        &self,
        decrements: &[StockDecrement],
    ) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<i64> = decrements.iter().map(|d| d.product_id.as_i64()).collect();
        let mut tx = self.pool.begin().await?;

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
        let mut products: Vec<Product> = rows.into_iter().map(Product::from).collect();

        let updated = documents::decrement(&mut products, decrements)?;
        for product in &updated {
            sqlx::query("UPDATE products SET variants = $2, updated_at = NOW() WHERE id = $1")
                .bind(product.id.as_i64())
                .bind(Json(&product.variants))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }
}

async fn insert_with_id(
    tx: &mut Transaction<'_, Postgres>,
    product: &Product,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO products
            (id, name, price, category, description, trending, best_seller,
             cloudinary_id, variants, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ",
    )
    .bind(product.id.as_i64())
    .bind(&product.name)
    .bind(product.price.amount())
    .bind(&product.category)
    .bind(&product.description)
    .bind(product.trending)
    .bind(product.best_seller)
    .bind(product.cloudinary_id.as_deref())
    .bind(Json(&product.variants))
    .bind(product.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
