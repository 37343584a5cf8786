//! Order repository for database operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pinkaura_core::{
    CustomerDetails, NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderItemId, OrderNumber,
    OrderStatus, ProductId,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::store::StoreError;

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_email, phone, \
                             alternate_phone, address, landmark, pincode, subtotal, shipping, \
                             total, payment_proof_url, payment_proof_public_id, status, created_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, variant_label, quantity, unit_price, line_total";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    customer_name: String,
    customer_email: String,
    phone: String,
    alternate_phone: Option<String>,
    address: String,
    landmark: String,
    pincode: String,
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    payment_proof_url: String,
    payment_proof_public_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let status: OrderStatus = self.status.parse().map_err(|e| {
            StoreError::DataCorruption(format!("order {} has {e}", self.order_number))
        })?;
        Ok(Order {
            id: OrderId::new(self.id),
            order_number: OrderNumber::from_stored(self.order_number),
            customer: CustomerDetails {
                name: self.customer_name,
                email: self.customer_email,
                phone: self.phone,
                alternate_phone: self.alternate_phone,
                address: self.address,
                landmark: self.landmark,
                pincode: self.pincode,
            },
            subtotal: self.subtotal.into(),
            shipping: self.shipping.into(),
            total: self.total.into(),
            payment_proof_url: self.payment_proof_url,
            payment_proof_public_id: self.payment_proof_public_id,
            status,
            created_at: self.created_at,
            items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    variant_label: String,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            StoreError::DataCorruption(format!(
                "order item {} has quantity {}",
                row.id, row.quantity
            ))
        })?;
        Ok(Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            variant_label: row.variant_label,
            quantity,
            unit_price: row.unit_price.into(),
            line_total: row.line_total.into(),
        })
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All orders with their items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a query fails, or
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        let item_rows: Vec<ItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM order_items ORDER BY id"))
                .fetch_all(self.pool)
                .await?;

        let mut items_by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(OrderItem::try_from(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    /// Get one order with its items.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_i64())
                .fetch_optional(self.pool)
                .await?;

        match row {
            Some(row) => {
                let items = self.items_for(id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    async fn items_for(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id.as_i64())
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(OrderItem::try_from).collect()
    }

    /// Insert an order header.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the insert fails.
    pub async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO orders
                (order_number, customer_name, customer_email, phone, alternate_phone,
                 address, landmark, pincode, subtotal, shipping, total,
                 payment_proof_url, payment_proof_public_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            ",
        )
        .bind(order.order_number.as_str())
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(order.customer.alternate_phone.as_deref())
        .bind(&order.customer.address)
        .bind(&order.customer.landmark)
        .bind(&order.customer.pincode)
        .bind(order.subtotal.amount())
        .bind(order.shipping.amount())
        .bind(order.total.amount())
        .bind(&order.payment_proof_url)
        .bind(order.payment_proof_public_id.as_deref())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .fetch_one(self.pool)
        .await?;

        Ok(order.into_order(OrderId::new(id)))
    }

    /// Insert the line items of an order in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order does not exist.
    pub async fn insert_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(order_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("Order {order_id}")));
        }

        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                StoreError::DataCorruption(format!("quantity {} out of range", item.quantity))
            })?;
            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO order_items
                    (order_id, product_id, product_name, variant_label, quantity,
                     unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                ",
            )
            .bind(order_id.as_i64())
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(&item.variant_label)
            .bind(quantity)
            .bind(item.unit_price.amount())
            .bind(item.line_total.amount())
            .fetch_one(&mut *tx)
            .await?;
            stored.push(item.into_item(OrderItemId::new(id), order_id));
        }

        tx.commit().await?;
        Ok(stored)
    }

    /// Delete an order and, by cascade, its items.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the delete fails.
    pub async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Set an order's status and return the updated order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no order has `id`.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(status.as_str())
        .fetch_optional(self.pool)
        .await?;

        let row = row.ok_or_else(|| StoreError::NotFound(format!("Order {id}")))?;
        let items = self.items_for(id).await?;
        row.into_order(items)
    }
}
