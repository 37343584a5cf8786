//! Quick checkout through `POST /api/checkout`.

use axum::http::{Method, StatusCode};
use pinkaura_integration_tests::{TestApp, mixed_catalog};
use serde_json::json;

#[tokio::test]
async fn test_checkout_takes_stock_and_returns_products() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/checkout",
            &json!({"cart": [{"id": 1, "color": "Gold", "qty": 2}]}),
            false,
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["productsUpdated"][0]["id"], 1);
    assert_eq!(body["productsUpdated"][0]["variants"][0]["stock"], 3);
    assert_eq!(app.stored_stock(1, 0), 3);
    // Other variants and products are left alone
    assert_eq!(app.stored_stock(1, 1), 3);
    assert_eq!(app.stored_stock(2, 0), 2);
    assert_eq!(app.stored_orders(), json!([]));
}

#[tokio::test]
async fn test_checkout_matches_color_case_insensitively() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/checkout",
            &json!({"cart": [{"id": 2, "color": " white ", "qty": 1}]}),
            false,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stored_stock(2, 0), 1);
}

#[tokio::test]
async fn test_checkout_insufficient_stock_is_conflict() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/checkout",
            &json!({"cart": [
                {"id": 1, "color": "Gold", "qty": 1},
                {"id": 2, "color": "White", "qty": 3}
            ]}),
            false,
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "Insufficient stock for Pearl Studs (White). Have 2, need 3"
    );
    // Nothing is written when any line is short
    assert_eq!(app.stored_stock(1, 0), 5);
    assert_eq!(app.stored_stock(2, 0), 2);
}

#[tokio::test]
async fn test_checkout_unknown_variant_is_bad_request() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/checkout",
            &json!({"cart": [{"id": 1, "color": "Platinum", "qty": 1}]}),
            false,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Variant not found for id=1, color=Platinum");
}

#[tokio::test]
async fn test_checkout_bad_line_and_empty_cart() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/checkout",
            &json!({"cart": [{"id": "abc", "color": "Gold", "qty": 1}]}),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Bad cart line");

    let (status, body) = app
        .json(Method::POST, "/api/checkout", &json!({"cart": []}), false)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart is empty or invalid");
}

#[tokio::test]
async fn test_checkout_rejects_malformed_json() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, body) = app
        .send(
            axum::http::Request::builder()
                .method(Method::POST)
                .uri("/api/checkout")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
