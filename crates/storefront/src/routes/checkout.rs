//! Quick checkout: takes stock for a cart without recording an order.

use axum::{Json, extract::State};
use pinkaura_core::{BadCartLine, CartLine, Product};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::routes::form::JsonBody;
use crate::services::orders::decrement_stock;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub cart: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    ok: bool,
    products_updated: Vec<Product>,
}

/// Read a submitted cart.
///
/// The cart must be a non-empty JSON array. Each line is read on its own so
/// one malformed line is reported as such rather than as a bad body.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a missing or empty cart, or for any
/// line without a positive id, a variant selector and a positive quantity.
pub fn parse_cart(value: serde_json::Value) -> Result<Vec<CartLine>, AppError> {
    let serde_json::Value::Array(lines) = value else {
        return Err(AppError::BadRequest("Cart is empty or invalid".to_string()));
    };
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty or invalid".to_string()));
    }

    lines
        .into_iter()
        .map(|line| {
            serde_json::from_value::<CartLine>(line)
                .map_err(|_| AppError::BadRequest(BadCartLine.to_string()))
        })
        .collect()
}

/// Decrement stock for a cart.
///
/// POST /api/checkout
#[instrument(skip(state, body))]
pub async fn checkout(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let cart = parse_cart(body.cart)?;
    let products_updated = decrement_stock(&state, &cart).await?;

    Ok(Json(CheckoutResponse {
        ok: true,
        products_updated,
    }))
}
