//! Catalog endpoints: listing, detail, and the admin writes.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use pinkaura_integration_tests::{MultipartForm, TestApp, mixed_catalog, ring_catalog};
use serde_json::{Value, json};

fn ids(body: &Value) -> Vec<i64> {
    body["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect()
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_listing_hides_products_without_images() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, body) = app.get("/api/products").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(ids(&body), vec![1, 2, 3]);
    assert_eq!(body["total"], 3);
    assert!(body["revision"].as_str().is_some_and(|r| !r.is_empty()));

    // The Silver variant has no images and is dropped
    let rose = &body["products"][0];
    assert_eq!(rose["variants"].as_array().unwrap().len(), 1);
    assert_eq!(rose["variants"][0]["color"], "Gold");
}

#[tokio::test]
async fn test_listing_annotates_stock_status() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (_, body) = app.get("/api/products").await;

    assert_eq!(body["products"][0]["variants"][0]["stockStatus"], "available");
    assert_eq!(body["products"][1]["variants"][0]["stockStatus"], "lowStock");
    assert_eq!(body["products"][2]["variants"][0]["stockStatus"], "outOfStock");
    assert_eq!(body["products"][0]["totalStock"], 5);
}

#[tokio::test]
async fn test_listing_filters_and_sorts() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (_, body) = app.get("/api/products?category=earrings").await;
    assert_eq!(ids(&body), vec![2]);

    let (_, body) = app.get("/api/products?search=ROSE").await;
    assert_eq!(ids(&body), vec![1]);

    let (_, body) = app.get("/api/products?category=trending").await;
    assert_eq!(ids(&body), vec![1]);

    let (_, body) = app.get("/api/products?minPrice=400&maxPrice=1000").await;
    assert_eq!(ids(&body), vec![1]);

    let (_, body) = app.get("/api/products?sort=priceDesc").await;
    assert_eq!(ids(&body), vec![3, 1, 2]);

    let (_, body) = app.get("/api/products?sort=priceAsc&pageSize=2&page=2").await;
    assert_eq!(ids(&body), vec![3]);
    assert_eq!(body["pages"], 2);
    assert_eq!(body["page"], 2);
}

#[tokio::test]
async fn test_full_listing_requires_admin_key() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, _) = app.get("/api/products?all=true").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get_admin("/api/products?all=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_product_detail() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, body) = app.get("/api/products/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["name"], "Pearl Studs");
    assert_eq!(body["product"]["variants"][0]["label"], "White");

    let (status, body) = app.get("/api/products/4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/products/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_responses_carry_api_headers() {
    let app = TestApp::with_products(ring_catalog(5)).await;

    let response = app
        .response(
            Request::builder()
                .uri("/api/products")
                .header("x-request-id", "req-abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-request-id"], "req-abc123");
}

#[tokio::test]
async fn test_cors_preflight_allows_admin_header() {
    let app = TestApp::with_products(ring_catalog(5)).await;

    let response = app
        .response(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/products")
                .header("origin", "https://pinkaura.in")
                .header("access-control-request-method", "PUT")
                .header("access-control-request-headers", "x-admin-key,content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(response.status().is_success());
    let allowed = response.headers()["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("x-admin-key"));
    assert_eq!(response.headers()["access-control-max-age"], "600");
}

// ============================================================================
// Admin writes
// ============================================================================

fn product_form(product: &Value) -> MultipartForm {
    MultipartForm::new()
        .json("productData", product)
        .file("image", "necklace.webp", "image/webp", &[0x52, 0x49, 0x46, 0x46, 0, 0, 0, 0])
}

fn new_necklace() -> Value {
    json!({
        "name": "  Moon Necklace ",
        "price": "799",
        "category": "necklaces",
        "description": "Crescent pendant",
        "trending": false,
        "bestSeller": true,
        "color": "Silver",
        "stock": "4"
    })
}

#[tokio::test]
async fn test_create_product_requires_admin_key() {
    let app = TestApp::with_products(ring_catalog(5)).await;
    app.accept_uploads().await;

    let (status, body) = app.multipart("/api/products", product_form(&new_necklace()), false).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid admin key");
    assert_eq!(app.upload_count().await, 0);
}

#[tokio::test]
async fn test_create_product_uploads_and_assigns_next_id() {
    let app = TestApp::with_products(ring_catalog(5)).await;
    app.accept_uploads().await;

    // Warm the cache so the listing below proves it was invalidated
    let (_, before) = app.get("/api/products").await;
    assert_eq!(ids(&before), vec![1]);

    let (status, body) = app.multipart("/api/products", product_form(&new_necklace()), true).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let product = &body["product"];
    assert_eq!(product["id"], 2);
    assert_eq!(product["name"], "Moon Necklace");
    assert_eq!(product["category"], "Necklaces");
    assert_eq!(product["price"], 799.0);
    assert_eq!(product["variants"][0]["stock"], 4);
    assert!(
        product["variants"][0]["images"][0]
            .as_str()
            .unwrap()
            .starts_with("https://res.cloudinary.com/")
    );

    let (_, after) = app.get("/api/products").await;
    assert_eq!(ids(&after), vec![1, 2]);
    assert_eq!(app.upload_count().await, 1);
}

#[tokio::test]
async fn test_create_product_rejects_unknown_category() {
    let app = TestApp::with_products(ring_catalog(5)).await;
    app.accept_uploads().await;

    let mut product = new_necklace();
    product["category"] = json!("Anklets");
    let (status, body) = app.multipart("/api/products", product_form(&product), true).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("unknown category"));
    assert_eq!(app.upload_count().await, 0);
}

#[tokio::test]
async fn test_create_product_rejects_svg() {
    let app = TestApp::with_products(ring_catalog(5)).await;
    app.accept_uploads().await;

    let form = MultipartForm::new()
        .json("productData", &new_necklace())
        .file("image", "necklace.svg", "image/svg+xml", b"<svg/>");
    let (status, _) = app.multipart("/api/products", form, true).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.upload_count().await, 0);
}

#[tokio::test]
async fn test_delete_product() {
    let app = TestApp::with_products(mixed_catalog()).await;

    let (status, _) = app
        .json(Method::DELETE, "/api/products/2", &Value::Null, false)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(Method::DELETE, "/api/products/2", &Value::Null, true)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, listing) = app.get("/api/products").await;
    assert_eq!(ids(&listing), vec![1, 3]);

    let (status, _) = app
        .json(Method::DELETE, "/api/products/2", &Value::Null, true)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replace_catalog_at_current_revision() {
    let app = TestApp::with_products(ring_catalog(5)).await;

    let (_, listing) = app.get_admin("/api/products?all=true").await;
    let revision = listing["revision"].as_str().unwrap().to_string();

    let mut products = ring_catalog(5);
    products[0]["variants"][0]["stock"] = json!(12);
    let (status, body) = app
        .json(
            Method::PUT,
            "/api/products",
            &json!({"products": products, "sha": revision}),
            true,
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_ne!(body["revision"], revision.as_str());
    assert_eq!(app.stored_stock(1, 0), 12);
}

#[tokio::test]
async fn test_replace_catalog_with_stale_revision_conflicts() {
    let app = TestApp::with_products(ring_catalog(5)).await;

    let (status, body) = app
        .json(
            Method::PUT,
            "/api/products",
            &json!({"products": ring_catalog(9), "sha": "stale"}),
            true,
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(app.stored_stock(1, 0), 5);
}

#[tokio::test]
async fn test_replace_catalog_requires_products_and_sha() {
    let app = TestApp::with_products(ring_catalog(5)).await;

    let (status, body) = app
        .json(Method::PUT, "/api/products", &json!({"products": []}), true)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing products or sha");
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_names_file_storage_with_warning() {
    let app = TestApp::with_products(ring_catalog(5)).await;

    let (status, body) = app.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "file");
    assert!(body["warning"].as_str().is_some());
}
