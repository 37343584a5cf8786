//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /api/health               - Health check and storage backend
//!
//! # Catalog
//! GET    /api/products             - Filtered, paged product listing
//! GET    /api/products/{id}        - Product detail
//! POST   /api/products             - Add a product with its image (admin)
//! PUT    /api/products             - Replace the catalog at a revision (admin)
//! DELETE /api/products/{id}        - Remove a product (admin)
//!
//! # Orders (rate limited)
//! POST   /api/orders               - Place an order with payment proof
//! POST   /api/checkout             - Take stock for a cart, no order
//!
//! # Order review (admin)
//! GET    /api/orders               - All orders, newest first
//! GET    /api/orders/{id}          - One order with items
//! PATCH  /api/orders/{id}/status   - Change status
//! ```
//!
//! Admin routes require the `x-admin-key` header.

pub mod checkout;
pub mod form;
pub mod health;
pub mod orders;
pub mod products;

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    middleware::from_fn,
    routing::{MethodRouter, get, patch, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AllowedOrigins;
use crate::middleware::{
    ADMIN_KEY_HEADER, api_headers_middleware, order_rate_limiter, request_id_middleware,
};
use crate::services::media::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Room for the largest image plus the JSON form fields around it.
const MAX_BODY_BYTES: usize = MAX_IMAGE_BYTES + 1024 * 1024;

const CORS_MAX_AGE: Duration = Duration::from_secs(600);

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let rate_limited = state.config().rate_limit_enabled;
    let cors = cors_layer(&state.config().allowed_origins);

    let api = Router::new()
        .route("/health", get(health::health))
        .route(
            "/products",
            get(products::index)
                .post(products::create)
                .put(products::replace),
        )
        .route(
            "/products/{id}",
            get(products::show).delete(products::delete),
        )
        .route(
            "/orders",
            limited(post(orders::create), rate_limited).get(orders::index),
        )
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route(
            "/checkout",
            limited(post(checkout::checkout), rate_limited),
        );

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(api_headers_middleware))
        .layer(cors)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Wrap an order route in the per-IP limiter when limiting is on.
fn limited(route: MethodRouter<AppState>, enabled: bool) -> MethodRouter<AppState> {
    if !enabled {
        return route;
    }
    match order_rate_limiter() {
        Some(limiter) => route.layer(limiter),
        None => {
            tracing::warn!("Rate limiter configuration rejected, order routes are unlimited");
            route
        }
    }
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => AllowOrigin::list(
            list.iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(ADMIN_KEY_HEADER)])
        .max_age(CORS_MAX_AGE)
}
