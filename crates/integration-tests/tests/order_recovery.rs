//! Order placement when a store write fails part way through.
//!
//! Runs on the GitHub backend served by [`FakeRepo`], which can fail one
//! chosen write while the writes around it succeed.

use std::time::Duration;

use axum::http::StatusCode;
use pinkaura_integration_tests::{
    FakeRepo, ORDERS_PATH, PRODUCTS_PATH, TestApp, order_form, ring_catalog,
};
use serde_json::json;

async fn github_app(repo: &FakeRepo) -> TestApp {
    repo.seed(PRODUCTS_PATH, &ring_catalog(5));
    let app = TestApp::with_github(repo).await;
    app.accept_uploads().await;
    app
}

async fn wait_for_destroys(app: &TestApp, expected: usize) -> usize {
    let mut seen = 0;
    for _ in 0..50 {
        seen = app.destroy_count().await;
        if seen >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    seen
}

#[tokio::test]
async fn test_github_backend_places_order() {
    let repo = FakeRepo::default();
    let app = github_app(&repo).await;

    let cart = json!([{"id": 1, "variantNumber": 1, "quantity": 2}]);
    let (status, body) = app.multipart("/api/orders", order_form(&cart, 1000.0), false).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(repo.document(PRODUCTS_PATH)[0]["variants"][0]["stock"], 3);
    let orders = repo.document(ORDERS_PATH);
    assert_eq!(orders[0]["items"][0]["quantity"], 2);
    assert_eq!(orders[0]["customer"]["landmark"], "Near the metro");
}

#[tokio::test]
async fn test_order_is_removed_when_items_cannot_be_saved() {
    let repo = FakeRepo::default();
    // First orders write records the order, the second adds its items
    repo.fail_put(ORDERS_PATH, 2);
    let app = github_app(&repo).await;

    let cart = json!([{"id": 1, "variantNumber": 1, "quantity": 2}]);
    let (status, body) = app.multipart("/api/orders", order_form(&cart, 1000.0), false).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(repo.put_count(ORDERS_PATH), 3);
    assert_eq!(repo.document(ORDERS_PATH), json!([]));
    assert_eq!(repo.put_count(PRODUCTS_PATH), 0);
    assert_eq!(repo.document(PRODUCTS_PATH)[0]["variants"][0]["stock"], 5);
    // The uploaded proof belongs to no order and is deleted
    assert_eq!(wait_for_destroys(&app, 1).await, 1);
}

#[tokio::test]
async fn test_order_is_kept_when_stock_commit_fails() {
    let repo = FakeRepo::default();
    repo.fail_put(PRODUCTS_PATH, 1);
    let app = github_app(&repo).await;

    let cart = json!([{"id": 1, "variantNumber": 1, "quantity": 2}]);
    let (status, body) = app.multipart("/api/orders", order_form(&cart, 1000.0), false).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);

    let orders = repo.document(ORDERS_PATH);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["items"].as_array().unwrap().len(), 1);
    assert_eq!(repo.document(PRODUCTS_PATH)[0]["variants"][0]["stock"], 5);

    // The proof stays with the recorded order
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.destroy_count().await, 0);
}
