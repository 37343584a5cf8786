//! Order records.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::checkout::{PricedCart, PricedLine};
use crate::customer::CustomerDetails;
use crate::types::{OrderId, OrderItemId, OrderStatus, Price, ProductId};

/// Human-facing order reference, e.g. `ORD-20260314-7KQ2XM`.
///
/// Unique per order in every backend; the numeric [`OrderId`] is the
/// storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

// No 0/O or 1/I so numbers read back over the phone unambiguously.
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 6;

impl OrderNumber {
    /// A fresh order number for an order placed at `now`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .filter_map(|_| SUFFIX_ALPHABET.choose(&mut rng))
            .map(|b| char::from(*b))
            .collect();
        Self(format!("ORD-{}-{suffix}", now.format("%Y%m%d")))
    }

    /// Wrap an order number read back from storage.
    #[must_use]
    pub const fn from_stored(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An order about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer: CustomerDetails,
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
    pub payment_proof_url: String,
    pub payment_proof_public_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A line item about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub variant_label: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

impl From<&PricedLine> for NewOrderItem {
    fn from(line: &PricedLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            variant_label: line.variant_label.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
        }
    }
}

impl NewOrder {
    /// A pending order for a validated cart.
    #[must_use]
    pub fn pending(
        customer: CustomerDetails,
        cart: &PricedCart,
        payment_proof_url: String,
        payment_proof_public_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            order_number: OrderNumber::generate(now),
            customer,
            subtotal: cart.totals.subtotal,
            shipping: cart.totals.shipping,
            total: cart.totals.total,
            payment_proof_url,
            payment_proof_public_id,
            status: OrderStatus::Pending,
            created_at: now,
        }
    }

    /// The stored order once a backend has assigned `id`. Items are attached
    /// separately.
    #[must_use]
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            order_number: self.order_number,
            customer: self.customer,
            subtotal: self.subtotal,
            shipping: self.shipping,
            total: self.total,
            payment_proof_url: self.payment_proof_url,
            payment_proof_public_id: self.payment_proof_public_id,
            status: self.status,
            created_at: self.created_at,
            items: Vec::new(),
        }
    }
}

impl NewOrderItem {
    #[must_use]
    pub fn into_item(self, id: OrderItemId, order_id: OrderId) -> OrderItem {
        OrderItem {
            id,
            order_id,
            product_id: self.product_id,
            product_name: self.product_name,
            variant_label: self.variant_label,
            quantity: self.quantity,
            unit_price: self.unit_price,
            line_total: self.line_total,
        }
    }
}

/// A recorded order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer: CustomerDetails,
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
    pub payment_proof_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof_public_id: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// A recorded order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub variant_label: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

/// Id for the next order appended to a list.
#[must_use]
pub fn next_order_id(orders: &[Order]) -> Option<OrderId> {
    orders
        .iter()
        .map(|o| o.id)
        .max()
        .map_or(Some(OrderId::new(1)), |max| max.next())
}

/// Id for the next order item appended across a list of orders.
#[must_use]
pub fn next_order_item_id(orders: &[Order]) -> Option<OrderItemId> {
    orders
        .iter()
        .flat_map(|o| o.items.iter().map(|i| i.id))
        .max()
        .map_or(Some(OrderItemId::new(1)), |max| max.next())
}
