//! Order review endpoints.

use axum::http::{Method, StatusCode};
use pinkaura_integration_tests::{TestApp, order_form, ring_catalog};
use serde_json::json;

async fn app_with_order() -> (TestApp, i64) {
    let app = TestApp::with_products(ring_catalog(5)).await;
    app.accept_uploads().await;

    let cart = json!([{"id": 1, "variantNumber": 1, "quantity": 1}]);
    let (status, body) = app.multipart("/api/orders", order_form(&cart, 560.0), false).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let id = body["orderId"].as_i64().unwrap();
    (app, id)
}

#[tokio::test]
async fn test_orders_require_admin_key() {
    let (app, id) = app_with_order().await;

    let (status, _) = app.get("/api/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get(&format!("/api/orders/{id}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_and_show_orders() {
    let (app, id) = app_with_order().await;

    let (status, body) = app.get_admin("/api/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);

    let (status, body) = app.get_admin(&format!("/api/orders/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let order = &body["order"];
    assert_eq!(order["customer"]["name"], "Ananya Sharma");
    assert_eq!(order["customer"]["phone"], "9876543210");
    assert_eq!(order["shipping"], 60.0);
    assert_eq!(order["total"], 560.0);
    assert_eq!(order["items"][0]["variantLabel"], "Gold");
    assert!(
        order["paymentProofUrl"]
            .as_str()
            .unwrap()
            .starts_with("https://res.cloudinary.com/")
    );

    let (status, _) = app.get_admin("/api/orders/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_order_status() {
    let (app, id) = app_with_order().await;
    let uri = format!("/api/orders/{id}/status");

    let (status, body) = app
        .json(Method::PATCH, &uri, &json!({"status": "confirmed"}), true)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["status"], "confirmed");
    assert_eq!(app.stored_orders()[0]["status"], "confirmed");

    let (status, body) = app
        .json(Method::PATCH, &uri, &json!({"status": "lost"}), true)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "unknown order status: lost");

    let (status, _) = app
        .json(Method::PATCH, "/api/orders/999/status", &json!({"status": "shipped"}), true)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancelling_does_not_restore_stock() {
    let (app, id) = app_with_order().await;
    assert_eq!(app.stored_stock(1, 0), 4);

    let (status, _) = app
        .json(
            Method::PATCH,
            &format!("/api/orders/{id}/status"),
            &json!({"status": "cancelled"}),
            true,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stored_stock(1, 0), 4);
}
