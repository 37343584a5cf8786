//! Cart lines and totals arithmetic.
//!
//! Clients keep the cart; the server only ever sees it as a list of
//! [`CartLine`]s at checkout time. The totals rules live here so the server
//! and anything else computing a total agree on them.

use serde::{Deserialize, Serialize};

use crate::catalog::VariantSelector;
use crate::types::{Price, ProductId};

/// One line of a submitted cart.
///
/// Two wire shapes are accepted: `{id, color, qty}` from the quick checkout
/// and `{id, variantNumber, quantity}` from the order form. A color wins when
/// both selectors are present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCartLine")]
pub struct CartLine {
    pub product_id: ProductId,
    pub selector: VariantSelector,
    pub quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCartLine {
    #[serde(alias = "productId")]
    id: Option<ProductId>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default, alias = "variant")]
    variant_number: Option<u32>,
    #[serde(default, alias = "qty")]
    quantity: Option<u32>,
}

/// Why a cart line could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Bad cart line")]
pub struct BadCartLine;

impl TryFrom<RawCartLine> for CartLine {
    type Error = BadCartLine;

    fn try_from(raw: RawCartLine) -> Result<Self, Self::Error> {
        let product_id = raw.id.filter(|id| id.as_i64() > 0).ok_or(BadCartLine)?;
        let quantity = raw.quantity.filter(|q| *q > 0).ok_or(BadCartLine)?;
        let color = raw.color.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        let selector = match (color, raw.variant_number) {
            (Some(color), _) => VariantSelector::Color(color),
            (None, Some(number)) if number > 0 => VariantSelector::Number(number),
            _ => return Err(BadCartLine),
        };
        Ok(Self {
            product_id,
            selector,
            quantity,
        })
    }
}

/// Totals the client claims for its cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTotals {
    #[serde(default)]
    pub subtotal: Option<Price>,
    #[serde(default)]
    pub shipping: Option<Price>,
    pub total: Price,
}

/// Server-computed totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Price,
    pub shipping: Price,
    pub tax: Price,
    pub total: Price,
}

/// Shipping fee, free-shipping threshold and the tolerance applied when
/// comparing a client total with the server's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: Price,
    pub free_threshold: Price,
    pub tolerance: Price,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Price::from_rupees(60),
            free_threshold: Price::from_rupees(999),
            tolerance: Price::from_rupees(1),
        }
    }
}

impl ShippingPolicy {
    /// Shipping charged on `subtotal`. Empty carts ship free.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Price) -> Price {
        if subtotal == Price::ZERO || subtotal >= self.free_threshold {
            Price::ZERO
        } else {
            self.flat_fee
        }
    }

    /// Full totals for a subtotal. Tax is always zero.
    #[must_use]
    pub fn totals(&self, subtotal: Price) -> CartTotals {
        let shipping = self.shipping_for(subtotal);
        CartTotals {
            subtotal,
            shipping,
            tax: Price::ZERO,
            total: subtotal + shipping,
        }
    }

    /// Whether a client-submitted total is close enough to the server's.
    #[must_use]
    pub fn accepts(&self, server: &CartTotals, client: &ClientTotals) -> bool {
        server.total.abs_diff(client.total) <= self.tolerance
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_legacy_line() {
        let line: CartLine = serde_json::from_str(r#"{"id":1,"color":"Gold","qty":2}"#).unwrap();
        assert_eq!(line.product_id, ProductId::new(1));
        assert_eq!(line.selector, VariantSelector::Color("Gold".into()));
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_reads_order_form_line() {
        let line: CartLine =
            serde_json::from_str(r#"{"id":4,"variantNumber":1,"quantity":3}"#).unwrap();
        assert_eq!(line.selector, VariantSelector::Number(1));
        assert_eq!(line.quantity, 3);
    }

    #[test]
    fn test_rejects_bad_lines() {
        for bad in [
            r#"{"color":"Gold","qty":1}"#,
            r#"{"id":1,"qty":1}"#,
            r#"{"id":1,"color":"Gold","qty":0}"#,
            r#"{"id":1,"color":"  ","qty":1}"#,
            r#"{"id":0,"color":"Gold","qty":1}"#,
            r#"{"id":1,"color":"Gold","qty":-1}"#,
        ] {
            assert!(serde_json::from_str::<CartLine>(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_shipping_threshold() {
        let policy = ShippingPolicy::default();
        assert_eq!(policy.shipping_for(Price::ZERO), Price::ZERO);
        assert_eq!(policy.shipping_for(Price::from_rupees(500)), Price::from_rupees(60));
        assert_eq!(policy.shipping_for(Price::from_rupees(998)), Price::from_rupees(60));
        assert_eq!(policy.shipping_for(Price::from_rupees(999)), Price::ZERO);
        assert_eq!(policy.shipping_for(Price::from_rupees(1000)), Price::ZERO);
    }

    #[test]
    fn test_totals_and_tolerance() {
        let policy = ShippingPolicy::default();
        let totals = policy.totals(Price::from_rupees(500));
        assert_eq!(totals.total, Price::from_rupees(560));

        let near = ClientTotals {
            subtotal: None,
            shipping: None,
            total: Price::from_rupees(561),
        };
        let far = ClientTotals {
            total: Price::from_rupees(562),
            ..near
        };
        assert!(policy.accepts(&totals, &near));
        assert!(!policy.accepts(&totals, &far));
    }
}
