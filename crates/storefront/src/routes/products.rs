//! Catalog route handlers.
//!
//! Shoppers read through the in-process catalog cache. Admin writes go
//! straight to the store and invalidate the cache afterwards.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use pinkaura_core::{CatalogQuery, NewProduct, Price, Product, ProductId, StockStatus, Variant};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::middleware::{RequireAdmin, check_admin_key};
use crate::routes::form::{FormParts, JsonBody};
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

/// A variant with its availability bucket.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantView<'a> {
    #[serde(flatten)]
    variant: &'a Variant,
    label: String,
    stock_status: StockStatus,
}

/// A product as returned by the catalog endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView<'a> {
    id: ProductId,
    name: &'a str,
    price: Price,
    category: &'a str,
    description: &'a str,
    trending: bool,
    best_seller: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cloudinary_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    total_stock: u64,
    variants: Vec<VariantView<'a>>,
}

impl<'a> From<&'a Product> for ProductView<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            id: product.id,
            name: &product.name,
            price: product.price,
            category: &product.category,
            description: &product.description,
            trending: product.trending,
            best_seller: product.best_seller,
            cloudinary_id: product.cloudinary_id.as_deref(),
            created_at: product.created_at,
            total_stock: product.total_stock(),
            variants: product
                .variants
                .iter()
                .enumerate()
                .map(|(position, variant)| VariantView {
                    variant,
                    label: variant.label(position),
                    stock_status: variant.stock_status(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListResponse<'a> {
    success: bool,
    products: Vec<ProductView<'a>>,
    total: usize,
    page: usize,
    pages: usize,
    revision: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse<'a> {
    success: bool,
    product: ProductView<'a>,
}

#[derive(Debug, Serialize)]
pub struct RevisionResponse {
    success: bool,
    revision: String,
}

// =============================================================================
// Shopper endpoints
// =============================================================================

/// Extra listing switch outside the catalog filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListOptions {
    /// Return the stored catalog unfiltered, including hidden products.
    /// Admin only.
    #[serde(default)]
    pub all: bool,
}

/// List products.
///
/// GET /api/products
///
/// With `?all=true` and a valid admin key the stored catalog is returned
/// as-is, which is what the admin editor saves back through `PUT`.
#[instrument(skip(state, headers, query))]
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(options): Query<ListOptions>,
    Query(query): Query<CatalogQuery>,
) -> Result<Response, AppError> {
    if options.all {
        check_admin_key(&headers, &state)?;
        let snapshot = state.store().load_catalog().await?;
        let total = snapshot.products.len();
        let body = ProductListResponse {
            success: true,
            products: snapshot.products.iter().map(ProductView::from).collect(),
            total,
            page: 1,
            pages: 1,
            revision: &snapshot.revision,
        };
        return Ok(Json(body).into_response());
    }

    let snapshot = state.cached_catalog().await?;
    let page = query.apply(&snapshot.products);
    let body = ProductListResponse {
        success: true,
        products: page.items.iter().map(ProductView::from).collect(),
        total: page.total,
        page: page.page,
        pages: page.pages,
        revision: &snapshot.revision,
    };
    Ok(Json(body).into_response())
}

/// Show one product.
///
/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Response, AppError> {
    let snapshot = state.cached_catalog().await?;
    let product = snapshot
        .products
        .iter()
        .find(|p| p.id == id)
        .and_then(Product::displayable)
        .ok_or_else(|| AppError::NotFound(format!("Product {id}")))?;

    let body = ProductResponse {
        success: true,
        product: ProductView::from(&product),
    };
    Ok(Json(body).into_response())
}

// =============================================================================
// Admin endpoints
// =============================================================================

/// Add a product from the admin form.
///
/// POST /api/products (multipart: `image`, `productData`)
#[instrument(skip(state, multipart))]
pub async fn create(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormParts::read(multipart).await?;
    let image = form
        .take_file("image")
        .map_err(|_| AppError::BadRequest("Image is required".to_string()))?;
    let new: NewProduct = form.json("productData")?;
    let new = new
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    image.check_product_image()?;

    let media = state.media()?;
    let uploaded = media.upload(image, media.product_folder()).await?;

    let product = match state
        .store()
        .create_product(new, uploaded.url, Some(uploaded.public_id.clone()))
        .await
    {
        Ok(product) => product,
        Err(e) => {
            media.spawn_destroy(uploaded.public_id);
            return Err(e.into());
        }
    };
    state.invalidate_catalog().await;

    info!(product_id = %product.id, name = %product.name, "Product added");
    let body = ProductResponse {
        success: true,
        product: ProductView::from(&product),
    };
    Ok(Json(body).into_response())
}

/// Remove a product and, best effort, its hosted image.
///
/// DELETE /api/products/{id}
#[instrument(skip(state))]
pub async fn delete(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Response, AppError> {
    let removed = state.store().delete_product(id).await?;
    state.invalidate_catalog().await;

    if let (Some(public_id), Some(media)) =
        (removed.cloudinary_id.clone(), state.media_if_configured())
    {
        media.spawn_destroy(public_id);
    }

    info!(product_id = %id, "Product deleted");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Product deleted",
    }))
    .into_response())
}

/// Whole-catalog save from the admin editor.
#[derive(Debug, Deserialize)]
pub struct ReplaceCatalogRequest {
    pub products: Option<Vec<Product>>,
    #[serde(alias = "revision")]
    pub sha: Option<String>,
}

/// Overwrite the catalog, guarded by the revision it was read at.
///
/// PUT /api/products
#[instrument(skip(state, body))]
pub async fn replace(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ReplaceCatalogRequest>,
) -> Result<Json<RevisionResponse>, AppError> {
    let (Some(products), Some(sha)) = (body.products, body.sha.filter(|s| !s.is_empty())) else {
        return Err(AppError::BadRequest("Missing products or sha".to_string()));
    };

    let count = products.len();
    let revision = state.store().replace_catalog(&products, &sha).await;
    state.invalidate_catalog().await;
    let revision = revision?;

    info!(products = count, "Catalog replaced");
    Ok(Json(RevisionResponse {
        success: true,
        revision,
    }))
}
