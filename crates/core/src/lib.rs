//! Pinkaura Core - Shared domain library.
//!
//! This crate provides the domain model and the pure business rules used by
//! every Pinkaura component:
//! - `storefront` - HTTP API for the catalog, checkout and order placement
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Every decision the order flow makes before it
//! touches a store (price lookup, stock check, totals) lives here so it can be
//! tested without a server.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`catalog`] - Products, variants, variant selectors, catalog queries
//! - [`cart`] - Cart lines and the shipping/totals arithmetic
//! - [`checkout`] - Server-side revalidation of a submitted cart
//! - [`customer`] - Customer contact details and their validation
//! - [`order`] - Order records and order numbers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod customer;
pub mod order;
pub mod types;

pub use cart::{BadCartLine, CartLine, CartTotals, ClientTotals, ShippingPolicy};
pub use catalog::{
    CatalogIssue, CatalogPage, CatalogQuery, NewProduct, NewProductError, Product, SortOrder,
    StockStatus, Variant, VariantSelector, check_catalog, next_product_id,
};
pub use checkout::{
    CheckoutError, PricedCart, PricedLine, StockDecrement, apply_decrements, validate_cart,
};
pub use customer::{CustomerDetails, CustomerError, FieldProblem};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderNumber, next_order_id, next_order_item_id,
};
pub use types::*;
