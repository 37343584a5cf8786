//! GitHub Contents API backend.
//!
//! The catalog and the order list are JSON files in a repository. Each
//! mutation reads the file with its blob `sha`, edits the document, and
//! writes it back with that `sha`. GitHub refuses the write if the file moved
//! on in between; that refusal surfaces as [`StoreError::Conflict`] and is not
//! retried.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use pinkaura_core::{
    NewOrder, NewOrderItem, NewProduct, Order, OrderId, OrderItem, OrderStatus, Product,
    ProductId, StockDecrement,
};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use super::{
    CatalogSnapshot, StoreError, documents, parse_orders, parse_products, to_pretty_json,
};
use crate::config::GitHubConfig;

const API_VERSION: &str = "2022-11-28";

/// Errors from the GitHub Contents API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The `sha` sent with a write no longer matches the file.
    #[error("{0} changed since it was read")]
    StaleRevision(String),

    /// File content was not valid base64.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Client configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A file read from the repository.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    pub sha: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutContentsResponse {
    content: PutContent,
}

#[derive(Deserialize)]
struct PutContent {
    sha: String,
}

/// Thin client for `GET`/`PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    branch: String,
    products_path: String,
    orders_path: String,
}

impl GitHubClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| GitHubError::Config(format!("Invalid token format: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("pinkaura-storefront"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            products_path: config.products_path.clone(),
            orders_path: config.orders_path.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            self.owner,
            self.repo,
            encoded.join("/")
        )
    }

    /// Read a file. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the content cannot be decoded.
    #[instrument(skip(self))]
    pub async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, GitHubError> {
        let response = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(path, "File not found in repository");
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ContentsResponse = response.json().await?;
        // GitHub wraps base64 at 60 columns
        let compact: String = body.content.split_whitespace().collect();
        let content = STANDARD
            .decode(compact)
            .map_err(|e| GitHubError::Decode(format!("{path}: {e}")))?;

        Ok(Some(RemoteFile {
            content,
            sha: body.sha,
        }))
    }

    /// Create or overwrite a file. `sha` must be the blob the edit was based
    /// on, or `None` when creating. Returns the new blob `sha`.
    ///
    /// # Errors
    ///
    /// Returns `GitHubError::StaleRevision` if GitHub rejects `sha`, or
    /// another error if the request fails.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, GitHubError> {
        let body = PutContentsRequest {
            message,
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha: sha.filter(|s| !s.is_empty()),
        };

        let response = self
            .client
            .put(self.contents_url(path))
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        // 409: sha does not match; 422: sha missing for an existing file
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(GitHubError::StaleRevision(path.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: PutContentsResponse = response.json().await?;
        debug!(path, sha = %body.content.sha, "File committed");
        Ok(body.content.sha)
    }
}

fn store_error(err: GitHubError) -> StoreError {
    match err {
        GitHubError::StaleRevision(path) => StoreError::Conflict(format!("{path} changed")),
        other => StoreError::GitHub(other),
    }
}

/// Catalog and orders kept as JSON files in a GitHub repository.
#[derive(Clone)]
pub struct GitHubStore {
    client: GitHubClient,
}

impl GitHubStore {
    #[must_use]
    pub const fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    async fn read_products(&self) -> Result<(Vec<Product>, Option<String>), StoreError> {
        let path = &self.client.products_path;
        match self.client.get_file(path).await.map_err(store_error)? {
            Some(file) => Ok((parse_products(&file.content, path)?, Some(file.sha))),
            None => Ok((Vec::new(), None)),
        }
    }

    async fn write_products(
        &self,
        products: &[Product],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, StoreError> {
        self.client
            .put_file(&self.client.products_path, &to_pretty_json(products)?, sha, message)
            .await
            .map_err(store_error)
    }

    async fn read_orders(&self) -> Result<(Vec<Order>, Option<String>), StoreError> {
        let path = &self.client.orders_path;
        match self.client.get_file(path).await.map_err(store_error)? {
            Some(file) => Ok((parse_orders(&file.content, path)?, Some(file.sha))),
            None => Ok((Vec::new(), None)),
        }
    }

    async fn write_orders(
        &self,
        orders: &[Order],
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_file(&self.client.orders_path, &to_pretty_json(orders)?, sha, message)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    pub(super) async fn load_catalog(&self) -> Result<CatalogSnapshot, StoreError> {
        let (products, sha) = self.read_products().await?;
        Ok(CatalogSnapshot {
            products,
            revision: sha.unwrap_or_default(),
        })
    }

    pub(super) async fn create_product(
        &self,
        new: NewProduct,
        image_url: String,
        cloudinary_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let (mut products, sha) = self.read_products().await?;
        let product = documents::add_product(&mut products, new, image_url, cloudinary_id, now)?;
        let message = format!("feat(admin): add product {}", product.name);
        self.write_products(&products, sha.as_deref(), &message).await?;
        Ok(product)
    }

    pub(super) async fn delete_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let (mut products, sha) = self.read_products().await?;
        let removed = documents::remove_product(&mut products, id)?;
        let message = format!("chore(admin): delete product {id}");
        self.write_products(&products, sha.as_deref(), &message).await?;
        Ok(removed)
    }

    pub(super) async fn replace_catalog(
        &self,
        products: &[Product],
        revision: &str,
    ) -> Result<String, StoreError> {
        self.write_products(products, Some(revision), "chore(admin): update products.json")
            .await
    }

    pub(super) async fn commit_stock(
        &self,
        decrements: &[StockDecrement],
    ) -> Result<Vec<Product>, StoreError> {
        let (mut products, sha) = self.read_products().await?;
        let updated = documents::decrement(&mut products, decrements)?;
        self.write_products(&products, sha.as_deref(), "chore: decrement stock on checkout")
            .await?;
        Ok(updated)
    }

    pub(super) async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let (mut orders, sha) = self.read_orders().await?;
        let order = documents::add_order(&mut orders, order)?;
        let message = format!("chore: record order {}", order.order_number);
        self.write_orders(&orders, sha.as_deref(), &message).await?;
        Ok(order)
    }

    pub(super) async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let (mut orders, sha) = self.read_orders().await?;
        let stored = documents::add_items(&mut orders, order_id, items)?;
        let message = format!("chore: add items to order {order_id}");
        self.write_orders(&orders, sha.as_deref(), &message).await?;
        Ok(stored)
    }

    pub(super) async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
        let (mut orders, sha) = self.read_orders().await?;
        if documents::remove_order(&mut orders, order_id) {
            let message = format!("chore: remove incomplete order {order_id}");
            self.write_orders(&orders, sha.as_deref(), &message).await?;
        }
        Ok(())
    }

    pub(super) async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.read_orders().await?.0)
    }

    pub(super) async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let (mut orders, sha) = self.read_orders().await?;
        let order = documents::set_status(&mut orders, id, status)?;
        let message = format!("chore(admin): mark order {id} {status}");
        self.write_orders(&orders, sha.as_deref(), &message).await?;
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use pinkaura_core::Price;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const CONTENTS_PATH: &str = "/repos/pinkaura/store/contents/data/products.json";

    fn store_for(server: &MockServer) -> GitHubStore {
        let config = GitHubConfig {
            token: SecretString::from("ghp_test_token"),
            owner: "pinkaura".into(),
            repo: "store".into(),
            branch: "main".into(),
            products_path: "data/products.json".into(),
            orders_path: "data/orders.json".into(),
            api_url: server.uri(),
        };
        GitHubStore::new(GitHubClient::new(&config).unwrap())
    }

    fn catalog_json(stock: u32) -> serde_json::Value {
        json!([{
            "id": 1, "name": "Rose Ring", "price": 500, "category": "Rings",
            "variants": [{"color": "Gold", "stock": stock, "images": ["a.jpg"]}]
        }])
    }

    fn contents_body(value: &serde_json::Value, sha: &str) -> serde_json::Value {
        let encoded = STANDARD.encode(serde_json::to_vec(value).unwrap());
        // GitHub line-wraps the payload
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8(c.to_vec()).unwrap())
            .collect();
        json!({ "content": wrapped.join("\n"), "sha": sha, "encoding": "base64" })
    }

    #[tokio::test]
    async fn test_load_catalog_decodes_content_and_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .and(query_param("ref", "main"))
            .and(header("authorization", "Bearer ghp_test_token"))
            .and(header("accept", "application/vnd.github+json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(contents_body(&catalog_json(5), "abc123")),
            )
            .mount(&server)
            .await;

        let snapshot = store_for(&server).load_catalog().await.unwrap();
        assert_eq!(snapshot.revision, "abc123");
        assert_eq!(snapshot.products[0].price, Price::from_rupees(500));
        assert_eq!(snapshot.products[0].variants[0].stock, 5);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let snapshot = store_for(&server).load_catalog().await.unwrap();
        assert!(snapshot.products.is_empty());
        assert_eq!(snapshot.revision, "");
    }

    #[tokio::test]
    async fn test_commit_stock_writes_with_read_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(contents_body(&catalog_json(5), "sha-1")),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .and(body_partial_json(json!({
                "message": "chore: decrement stock on checkout",
                "sha": "sha-1",
                "branch": "main"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"content": {"sha": "sha-2"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let decrements = [StockDecrement {
            product_id: ProductId::new(1),
            variant_index: 0,
            quantity: 2,
        }];
        let updated = store_for(&server).commit_stock(&decrements).await.unwrap();
        assert_eq!(updated[0].variants[0].stock, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_never_writes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(contents_body(&catalog_json(1), "sha-1")),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let decrements = [StockDecrement {
            product_id: ProductId::new(1),
            variant_index: 0,
            quantity: 2,
        }];
        let err = store_for(&server).commit_stock(&decrements).await.unwrap_err();
        assert!(matches!(err, StoreError::Stock(_)));
    }

    #[tokio::test]
    async fn test_stale_sha_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "message": "data/products.json does not match sha-old"
            })))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .replace_catalog(&[], "sha-old")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = store_for(&server).load_catalog().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::GitHub(GitHubError::Api { status: 502, .. })
        ));
    }
}
