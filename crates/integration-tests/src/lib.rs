//! Integration tests for Pinkaura.
//!
//! # Running Tests
//!
//! ```bash
//! # Router tests (local-file backend, mocked Cloudinary)
//! cargo test -p pinkaura-integration-tests
//!
//! # Postgres tests as well
//! DATABASE_URL=postgres://localhost/pinkaura_test \
//!     cargo test -p pinkaura-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `order_flow` - Order placement end to end
//! - `catalog_api` - Listing, detail and admin catalog writes
//! - `checkout_api` - Quick stock-only checkout
//! - `admin_orders` - Order review and status changes
//! - `postgres_store` - Postgres backend (ignored by default)
//!
//! Every [`TestApp`] gets its own temp directory holding `products.json`
//! and `orders.json`, and its own wiremock server standing in for
//! Cloudinary. Requests go through the real router via `oneshot`.
//! [`FakeRepo`] serves the GitHub Contents API from memory for tests that
//! need the GitHub backend or a write that fails part way through an order.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pinkaura_storefront::config::{
    BackendConfig, CloudinaryConfig, EmailProvider, GitHubConfig, StorefrontConfig,
};
use pinkaura_storefront::middleware::ADMIN_KEY_HEADER;
use pinkaura_storefront::routes;
use pinkaura_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

/// Admin key configured on every test app.
pub const ADMIN_KEY: &str = "pk-Integration-9f3a1c7e";

/// Cloud name the mocked Cloudinary answers for.
pub const CLOUD_NAME: &str = "pinkaura-test";

/// A storefront router over a throwaway local-file catalog.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub cloudinary: MockServer,
    github: Option<MockServer>,
    dir: PathBuf,
}

impl TestApp {
    /// Start an app whose catalog file holds `products`.
    pub async fn with_products(products: Value) -> Self {
        Self::build(products, |_| {}).await
    }

    /// Start an app that sends order emails through SendGrid at `email`.
    pub async fn with_sendgrid(products: Value, email: &MockServer) -> Self {
        let api_url = email.uri();
        Self::build(products, move |config| {
            config.email.provider = EmailProvider::SendGrid {
                api_key: SecretString::from("SG.test-key"),
                from: "orders@pinkaura.in".to_string(),
                api_url,
            };
            config.email.store_owner_email = Some("owner@pinkaura.in".to_string());
        })
        .await
    }

    async fn build(products: Value, configure: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let dir = std::env::temp_dir().join(format!("pinkaura-it-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("Failed to create test directory");
        let products_file = dir.join("products.json");
        std::fs::write(
            &products_file,
            serde_json::to_vec_pretty(&products).expect("Failed to encode products"),
        )
        .expect("Failed to write products file");

        let cloudinary = MockServer::start().await;

        let mut config = StorefrontConfig::local_files(products_file, dir.join("orders.json"));
        config.admin_key = Some(SecretString::from(ADMIN_KEY));
        config.cloudinary = Some(CloudinaryConfig {
            cloud_name: CLOUD_NAME.to_string(),
            api_key: "123456".to_string(),
            api_secret: SecretString::from("test-secret"),
            product_folder: "pinkaura-products".to_string(),
            proof_folder: "pinkaura-payment-proofs".to_string(),
            api_url: cloudinary.uri(),
        });
        configure(&mut config);

        let state = AppState::new(config)
            .await
            .expect("Failed to build application state");
        let router = routes::router(state.clone());

        Self {
            router,
            state,
            cloudinary,
            github: None,
            dir,
        }
    }

    /// Start an app on the GitHub backend, served from `repo`.
    pub async fn with_github(repo: &FakeRepo) -> Self {
        let github = MockServer::start().await;
        repo.mount(&github).await;

        let api_url = github.uri();
        let mut app = Self::build(json!([]), move |config| {
            config.backend = BackendConfig::GitHub(GitHubConfig {
                token: SecretString::from("ghp_integration"),
                owner: REPO_OWNER.to_string(),
                repo: REPO_NAME.to_string(),
                branch: "main".to_string(),
                products_path: PRODUCTS_PATH.to_string(),
                orders_path: ORDERS_PATH.to_string(),
                api_url,
            });
        })
        .await;
        app.github = Some(github);
        app
    }

    /// Accept every upload, answering with a URL and public id.
    pub async fn accept_uploads(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/v1_1/{CLOUD_NAME}/image/upload")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secure_url": "https://res.cloudinary.com/pinkaura-test/image/upload/v1/upload.png",
                "public_id": "pinkaura-payment-proofs/upload",
            })))
            .mount(&self.cloudinary)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"/v1_1/.+/image/destroy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .mount(&self.cloudinary)
            .await;
    }

    /// Number of upload calls Cloudinary received.
    pub async fn upload_count(&self) -> usize {
        self.cloudinary
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().ends_with("/image/upload"))
            .count()
    }

    /// Number of destroy calls Cloudinary received.
    pub async fn destroy_count(&self) -> usize {
        self.cloudinary
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().ends_with("/image/destroy"))
            .count()
    }

    /// Send a request through the router.
    pub async fn response(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed")
    }

    /// Send a request through the router and decode the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.response(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, false).body(Body::empty()).expect("request"))
            .await
    }

    pub async fn get_admin(&self, uri: &str) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, true).body(Body::empty()).expect("request"))
            .await
    }

    /// Send a JSON body, with the admin key if `admin`.
    pub async fn json(&self, method: Method, uri: &str, body: &Value, admin: bool) -> (StatusCode, Value) {
        self.send(
            request(method, uri, admin)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    /// Send a multipart form, with the admin key if `admin`.
    pub async fn multipart(&self, uri: &str, form: MultipartForm, admin: bool) -> (StatusCode, Value) {
        let (content_type, body) = form.finish();
        self.send(
            request(Method::POST, uri, admin)
                .header(CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
    }

    /// The products file as currently stored.
    #[must_use]
    pub fn stored_products(&self) -> Value {
        read_json(&self.dir.join("products.json"))
    }

    /// The orders file as currently stored, `[]` before the first order.
    #[must_use]
    pub fn stored_orders(&self) -> Value {
        let path = self.dir.join("orders.json");
        if path.exists() {
            read_json(&path)
        } else {
            json!([])
        }
    }

    /// Stock of one variant in the stored catalog.
    #[must_use]
    pub fn stored_stock(&self, product_id: i64, variant_index: usize) -> u64 {
        self.stored_products()
            .as_array()
            .and_then(|products| {
                products
                    .iter()
                    .find(|p| p["id"].as_i64() == Some(product_id))
            })
            .and_then(|p| p["variants"].get(variant_index))
            .and_then(|v| v["stock"].as_u64())
            .expect("variant not found in stored catalog")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn request(method: Method, uri: &str, admin: bool) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    if admin {
        builder.header(ADMIN_KEY_HEADER, ADMIN_KEY)
    } else {
        builder
    }
}

fn read_json(path: &std::path::Path) -> Value {
    let bytes = std::fs::read(path).expect("Failed to read stored file");
    serde_json::from_slice(&bytes).expect("Stored file is not JSON")
}

// =============================================================================
// GitHub Contents API
// =============================================================================

const REPO_OWNER: &str = "pinkaura";
const REPO_NAME: &str = "store";

/// Catalog path inside the [`FakeRepo`].
pub const PRODUCTS_PATH: &str = "data/products.json";

/// Order list path inside the [`FakeRepo`].
pub const ORDERS_PATH: &str = "data/orders.json";

/// Repository files kept in memory behind the GitHub Contents API.
///
/// `GET` returns the file with a `sha` that changes on every write. `PUT`
/// checks the `sha` like GitHub does and answers 409 when it is stale. Single
/// writes can be made to fail with a 500 through [`FakeRepo::fail_put`].
#[derive(Clone, Default)]
pub struct FakeRepo {
    inner: Arc<Mutex<RepoFiles>>,
}

#[derive(Default)]
struct RepoFiles {
    files: HashMap<String, (Vec<u8>, u32)>,
    puts: HashMap<String, usize>,
    failing_puts: HashSet<(String, usize)>,
}

impl FakeRepo {
    /// Store `value` at `path` without counting it as a write.
    pub fn seed(&self, path: &str, value: &Value) {
        let bytes = serde_json::to_vec_pretty(value).expect("Failed to encode seed");
        self.files().files.insert(path.to_string(), (bytes, 1));
    }

    /// Make the `nth` write (1-based) to `path` fail with a 500.
    pub fn fail_put(&self, path: &str, nth: usize) {
        self.files().failing_puts.insert((path.to_string(), nth));
    }

    /// The JSON document at `path`, `[]` if it was never written.
    #[must_use]
    pub fn document(&self, path: &str) -> Value {
        self.files()
            .files
            .get(path)
            .map_or_else(|| json!([]), |(bytes, _)| {
                serde_json::from_slice(bytes).expect("Stored file is not JSON")
            })
    }

    /// Writes attempted on `path`, failed ones included.
    #[must_use]
    pub fn put_count(&self, path: &str) -> usize {
        self.files().puts.get(path).copied().unwrap_or_default()
    }

    async fn mount(&self, server: &MockServer) {
        Mock::given(path_regex(format!("^/repos/{REPO_OWNER}/{REPO_NAME}/contents/")))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    fn files(&self) -> std::sync::MutexGuard<'_, RepoFiles> {
        self.inner.lock().expect("Repo lock poisoned")
    }
}

impl Respond for FakeRepo {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let prefix = format!("/repos/{REPO_OWNER}/{REPO_NAME}/contents/");
        let file = request.url.path().trim_start_matches(&prefix).to_string();
        let mut repo = self.files();

        match request.method.as_str() {
            "GET" => match repo.files.get(&file) {
                Some((bytes, version)) => ResponseTemplate::new(200).set_body_json(json!({
                    "content": STANDARD.encode(bytes),
                    "sha": format!("{file}@{version}"),
                    "encoding": "base64",
                })),
                None => ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
            },
            "PUT" => {
                let attempt = {
                    let count = repo.puts.entry(file.clone()).or_default();
                    *count += 1;
                    *count
                };
                if repo.failing_puts.contains(&(file.clone(), attempt)) {
                    return ResponseTemplate::new(500)
                        .set_body_json(json!({"message": "Server Error"}));
                }

                let body: Value =
                    serde_json::from_slice(&request.body).expect("PUT body is not JSON");
                let current = repo
                    .files
                    .get(&file)
                    .map(|(_, version)| format!("{file}@{version}"));
                if body["sha"].as_str() != current.as_deref() {
                    return ResponseTemplate::new(409)
                        .set_body_json(json!({"message": "sha does not match"}));
                }

                let content = STANDARD
                    .decode(body["content"].as_str().expect("PUT body without content"))
                    .expect("PUT content is not base64");
                let version = repo.files.get(&file).map_or(1, |(_, v)| v + 1);
                repo.files.insert(file.clone(), (content, version));
                ResponseTemplate::new(200).set_body_json(json!({
                    "content": {"sha": format!("{file}@{version}")}
                }))
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

// =============================================================================
// Multipart bodies
// =============================================================================

/// A `multipart/form-data` body built by hand for `oneshot` requests.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: format!("pinkaura-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    #[must_use]
    pub fn json(self, name: &str, value: &Value) -> Self {
        self.text(name, &value.to_string())
    }

    #[must_use]
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Content type header value and the finished body.
    #[must_use]
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// One ring priced 500 with a single gold variant holding `stock` units.
#[must_use]
pub fn ring_catalog(stock: u32) -> Value {
    json!([
        {
            "id": 1,
            "name": "Rose Ring",
            "price": 500,
            "category": "Rings",
            "description": "Rose gold plated ring",
            "trending": true,
            "bestSeller": false,
            "variants": [
                {
                    "color": "Gold",
                    "variantNumber": 1,
                    "stock": stock,
                    "images": ["https://res.cloudinary.com/pinkaura-test/rose-ring.jpg"]
                }
            ]
        }
    ])
}

/// A small catalog with a hidden variant and a fully hidden product.
#[must_use]
pub fn mixed_catalog() -> Value {
    json!([
        {
            "id": 1,
            "name": "Rose Ring",
            "price": 500,
            "category": "Rings",
            "trending": true,
            "variants": [
                {"color": "Gold", "stock": 5, "images": ["https://img/rose-gold.jpg"]},
                {"color": "Silver", "stock": 3, "images": []}
            ]
        },
        {
            "id": 2,
            "name": "Pearl Studs",
            "price": 350,
            "category": "Earrings",
            "bestSeller": true,
            "variants": [
                {"color": "White", "stock": 2, "images": ["https://img/pearl.jpg"]}
            ]
        },
        {
            "id": 3,
            "name": "Charm Bracelet",
            "price": 1200,
            "category": "Bracelets",
            "variants": [
                {"color": "Gold", "stock": 0, "images": ["https://img/charm.jpg"]}
            ]
        },
        {
            "id": 4,
            "name": "Draft Necklace",
            "price": 800,
            "category": "Necklaces",
            "variants": [
                {"color": "Gold", "stock": 4, "images": []}
            ]
        }
    ])
}

/// Valid customer details.
#[must_use]
pub fn customer() -> Value {
    json!({
        "name": "Ananya Sharma",
        "email": "ananya@example.com",
        "phone": "9876543210",
        "address": "12 MG Road, Bengaluru",
        "landmark": "Near the metro",
        "pincode": "560001"
    })
}

/// A PNG-looking payment screenshot.
#[must_use]
pub fn screenshot() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 256]);
    bytes
}

/// The order form for `cart` with the client claiming `total`.
#[must_use]
pub fn order_form(cart: &Value, total: f64) -> MultipartForm {
    MultipartForm::new()
        .json("cartItems", cart)
        .json("customerDetails", &customer())
        .json("totalsFromClient", &json!({"total": total}))
        .file("screenshot", "payment.png", "image/png", &screenshot())
}
