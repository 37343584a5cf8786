//! Order placement and review handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use pinkaura_core::{
    CartTotals, ClientTotals, CustomerDetails, Order, OrderId, OrderNumber, OrderStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::routes::checkout::parse_cart;
use crate::routes::form::{FormParts, JsonBody};
use crate::services::orders::{OrderSubmission, place_order};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    success: bool,
    order_id: OrderId,
    order_number: OrderNumber,
    totals: CartTotals,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    success: bool,
    order: Order,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    success: bool,
    orders: Vec<Order>,
}

/// Place an order.
///
/// POST /api/orders (multipart: `cartItems`, `customerDetails`,
/// `totalsFromClient`, `screenshot`)
#[instrument(skip(state, multipart))]
pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PlaceOrderResponse>, AppError> {
    let mut form = FormParts::read(multipart).await?;

    let screenshot = form
        .take_file("screenshot")
        .map_err(|_| AppError::BadRequest("Payment screenshot is required".to_string()))?;
    let cart = parse_cart(form.json("cartItems")?)?;
    let customer: CustomerDetails = form.json("customerDetails")?;
    let client_totals: ClientTotals = form.json("totalsFromClient")?;

    let placed = place_order(
        &state,
        OrderSubmission {
            cart,
            customer,
            client_totals,
            screenshot,
        },
    )
    .await?;

    Ok(Json(PlaceOrderResponse {
        success: true,
        order_id: placed.order.id,
        order_number: placed.order.order_number,
        totals: placed.totals,
    }))
}

/// List every order, newest first.
///
/// GET /api/orders
#[instrument(skip(state))]
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<OrderListResponse>, AppError> {
    let orders = state.store().list_orders().await?;
    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}

/// Show one order with its items.
///
/// GET /api/orders/{id}
#[instrument(skip(state))]
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id}")))?;

    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Change an order's status.
///
/// PATCH /api/orders/{id}/status
#[instrument(skip(state, body))]
pub async fn update_status(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    JsonBody(body): JsonBody<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let status: OrderStatus = body.status.parse().map_err(AppError::BadRequest)?;
    let order = state.store().update_order_status(id, status).await?;

    info!(order_id = %id, status = %status, "Order status changed");
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}
