//! Server-side revalidation of a submitted cart.
//!
//! [`validate_cart`] is the pure half of the order flow: it resolves every
//! line against the authoritative catalog, checks stock, prices the cart and
//! plans the stock decrements. Nothing here touches a store, so a failure is
//! always reported before anything has been mutated.

use std::collections::HashMap;

use serde::Serialize;

use crate::cart::{CartLine, CartTotals, ClientTotals, ShippingPolicy};
use crate::catalog::{Product, VariantSelector};
use crate::types::{Price, ProductId};

/// Reasons a cart is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product not found for id={0}")]
    UnknownProduct(ProductId),

    #[error("Variant not found for id={product}, {selector}")]
    UnknownVariant {
        product: ProductId,
        selector: VariantSelector,
    },

    #[error("Insufficient stock for {name} ({variant}). Have {available}, need {requested}")]
    InsufficientStock {
        name: String,
        variant: String,
        available: u32,
        requested: u32,
    },

    #[error("Order total has changed: expected {expected}, received {submitted}")]
    TotalMismatch { expected: Price, submitted: Price },
}

impl CheckoutError {
    /// Whether the error is a stock conflict rather than a bad request.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::InsufficientStock { .. })
    }
}

/// A cart line resolved against the catalog and priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub variant_index: usize,
    pub variant_label: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

/// Stock to take from one variant once the order is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub variant_index: usize,
    pub quantity: u32,
}

/// A validated, priced cart with its planned stock decrements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub totals: CartTotals,
    pub decrements: Vec<StockDecrement>,
}

impl PricedCart {
    /// Compare the client's totals with the server's.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::TotalMismatch`] when the totals differ by more
    /// than the policy tolerance.
    pub fn verify_client_totals(
        &self,
        client: &ClientTotals,
        policy: &ShippingPolicy,
    ) -> Result<(), CheckoutError> {
        if policy.accepts(&self.totals, client) {
            Ok(())
        } else {
            Err(CheckoutError::TotalMismatch {
                expected: self.totals.total,
                submitted: client.total,
            })
        }
    }
}

/// Resolve, stock-check and price `lines` against `products`.
///
/// Several lines naming the same variant are checked against its stock as one
/// combined quantity.
///
/// # Errors
///
/// Returns the first [`CheckoutError`] found. Unknown products and variants
/// are reported before any stock problem.
pub fn validate_cart(
    products: &[Product],
    lines: &[CartLine],
    policy: &ShippingPolicy,
) -> Result<PricedCart, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut priced = Vec::with_capacity(lines.len());
    let mut wanted: Vec<(ProductId, usize, u32)> = Vec::new();

    for line in lines {
        let product = by_id
            .get(&line.product_id)
            .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
        let (variant_index, variant) =
            product
                .find_variant(&line.selector)
                .ok_or_else(|| CheckoutError::UnknownVariant {
                    product: product.id,
                    selector: line.selector.clone(),
                })?;

        match wanted
            .iter_mut()
            .find(|(id, idx, _)| *id == product.id && *idx == variant_index)
        {
            Some((_, _, qty)) => *qty = qty.saturating_add(line.quantity),
            None => wanted.push((product.id, variant_index, line.quantity)),
        }

        priced.push(PricedLine {
            product_id: product.id,
            product_name: product.name.clone(),
            variant_index,
            variant_label: variant.label(variant_index),
            quantity: line.quantity,
            unit_price: product.price,
            line_total: product.price.times(line.quantity),
        });
    }

    let mut decrements = Vec::with_capacity(wanted.len());
    for (product_id, variant_index, quantity) in wanted {
        let product = by_id
            .get(&product_id)
            .ok_or(CheckoutError::UnknownProduct(product_id))?;
        check_stock(product, variant_index, quantity)?;
        decrements.push(StockDecrement {
            product_id,
            variant_index,
            quantity,
        });
    }

    let subtotal: Price = priced.iter().map(|l| l.line_total).sum();
    Ok(PricedCart {
        lines: priced,
        totals: policy.totals(subtotal),
        decrements,
    })
}

fn check_stock(product: &Product, variant_index: usize, quantity: u32) -> Result<(), CheckoutError> {
    let variant = product
        .variants
        .get(variant_index)
        .ok_or_else(|| CheckoutError::UnknownVariant {
            product: product.id,
            selector: VariantSelector::Number(u32::try_from(variant_index + 1).unwrap_or(u32::MAX)),
        })?;
    if quantity > variant.stock {
        return Err(CheckoutError::InsufficientStock {
            name: product.name.clone(),
            variant: variant.label(variant_index),
            available: variant.stock,
            requested: quantity,
        });
    }
    Ok(())
}

/// Apply planned decrements to a freshly loaded catalog.
///
/// Stock is re-checked against `products` first; if any variant no longer
/// has enough, nothing is changed. Returns the ids of the products modified.
///
/// # Errors
///
/// Returns [`CheckoutError::UnknownProduct`] if a product disappeared or
/// [`CheckoutError::InsufficientStock`] if stock ran out in the meantime.
pub fn apply_decrements(
    products: &mut [Product],
    decrements: &[StockDecrement],
) -> Result<Vec<ProductId>, CheckoutError> {
    for d in decrements {
        let product = products
            .iter()
            .find(|p| p.id == d.product_id)
            .ok_or(CheckoutError::UnknownProduct(d.product_id))?;
        check_stock(product, d.variant_index, d.quantity)?;
    }

    let mut touched = Vec::new();
    for d in decrements {
        if let Some(variant) = products
            .iter_mut()
            .find(|p| p.id == d.product_id)
            .and_then(|p| p.variants.get_mut(d.variant_index))
        {
            variant.stock -= d.quantity;
        }
        if !touched.contains(&d.product_id) {
            touched.push(d.product_id);
        }
    }
    Ok(touched)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::catalog::Variant;

    fn catalog(stock: u32) -> Vec<Product> {
        vec![Product {
            id: ProductId::new(1),
            name: "Rose Ring".into(),
            price: Price::from_rupees(500),
            category: "Rings".into(),
            description: String::new(),
            trending: false,
            best_seller: false,
            cloudinary_id: None,
            variants: vec![
                Variant {
                    color: Some("Gold".into()),
                    variant_number: None,
                    stock,
                    images: vec!["a.jpg".into()],
                },
                Variant {
                    color: Some("Silver".into()),
                    variant_number: None,
                    stock: 10,
                    images: vec!["b.jpg".into()],
                },
            ],
            created_at: None,
        }]
    }

    fn line(id: i64, selector: VariantSelector, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            selector,
            quantity,
        }
    }

    #[test]
    fn test_two_of_five_leaves_three_and_ships_free() {
        let mut products = catalog(5);
        let policy = ShippingPolicy::default();
        let cart = validate_cart(
            &products,
            &[line(1, VariantSelector::Number(1), 2)],
            &policy,
        )
        .unwrap();

        assert_eq!(cart.totals.subtotal, Price::from_rupees(1000));
        assert_eq!(cart.totals.shipping, Price::ZERO);
        assert_eq!(cart.totals.total, Price::from_rupees(1000));

        let touched = apply_decrements(&mut products, &cart.decrements).unwrap();
        assert_eq!(touched, vec![ProductId::new(1)]);
        assert_eq!(products[0].variants[0].stock, 3);
        assert_eq!(products[0].variants[1].stock, 10);
    }

    #[test]
    fn test_two_of_one_is_insufficient() {
        let products = catalog(1);
        let err = validate_cart(
            &products,
            &[line(1, VariantSelector::Number(1), 2)],
            &ShippingPolicy::default(),
        )
        .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Rose Ring (Gold). Have 1, need 2"
        );
        assert_eq!(products[0].variants[0].stock, 1);
    }

    #[test]
    fn test_quantities_for_same_variant_are_summed() {
        let products = catalog(3);
        let err = validate_cart(
            &products,
            &[
                line(1, VariantSelector::Color("gold".into()), 2),
                line(1, VariantSelector::Number(1), 2),
            ],
            &ShippingPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_small_cart_pays_shipping() {
        let products = catalog(5);
        let cart = validate_cart(
            &products,
            &[line(1, VariantSelector::Color("Silver".into()), 1)],
            &ShippingPolicy::default(),
        )
        .unwrap();
        assert_eq!(cart.totals.total, Price::from_rupees(560));
        assert_eq!(cart.lines[0].variant_label, "Silver");
        assert_eq!(cart.decrements[0].variant_index, 1);
    }

    #[test]
    fn test_unknown_product_and_variant() {
        let products = catalog(5);
        let policy = ShippingPolicy::default();
        assert_eq!(
            validate_cart(&products, &[line(9, VariantSelector::Number(1), 1)], &policy),
            Err(CheckoutError::UnknownProduct(ProductId::new(9)))
        );
        let err = validate_cart(
            &products,
            &[line(1, VariantSelector::Color("Blue".into()), 1)],
            &policy,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Variant not found for id=1, color=Blue");
        assert_eq!(validate_cart(&products, &[], &policy), Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn test_client_total_tolerance() {
        let products = catalog(5);
        let policy = ShippingPolicy::default();
        let cart = validate_cart(&products, &[line(1, VariantSelector::Number(1), 2)], &policy)
            .unwrap();

        let within = ClientTotals {
            subtotal: None,
            shipping: None,
            total: Price::from_rupees(1001),
        };
        assert!(cart.verify_client_totals(&within, &policy).is_ok());

        let stale = ClientTotals {
            total: Price::from_rupees(1060),
            ..within
        };
        assert!(matches!(
            cart.verify_client_totals(&stale, &policy),
            Err(CheckoutError::TotalMismatch { .. })
        ));
    }

    #[test]
    fn test_apply_rechecks_and_changes_nothing_on_failure() {
        let products = catalog(5);
        let cart = validate_cart(
            &products,
            &[
                line(1, VariantSelector::Number(2), 1),
                line(1, VariantSelector::Number(1), 4),
            ],
            &ShippingPolicy::default(),
        )
        .unwrap();

        // another checkout took stock in between
        let mut fresh = catalog(2);
        assert!(apply_decrements(&mut fresh, &cart.decrements).is_err());
        assert_eq!(fresh[0].variants[0].stock, 2);
        assert_eq!(fresh[0].variants[1].stock, 10);
    }
}
