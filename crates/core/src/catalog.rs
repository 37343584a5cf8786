//! Product catalog model.
//!
//! The catalog is the authoritative list of products, prices and per-variant
//! stock. It is persisted as a JSON array with camelCase keys (see the
//! storefront's store backends), so the serde layout here *is* the file
//! format:
//!
//! ```json
//! {
//!   "id": 1,
//!   "name": "Rose Quartz Ring",
//!   "price": 500,
//!   "category": "Rings",
//!   "description": "",
//!   "trending": true,
//!   "bestSeller": false,
//!   "cloudinaryId": "pinkaura-products/abc123",
//!   "variants": [
//!     { "color": "Rose Gold", "images": ["https://..."], "stock": 5 }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Price, ProductId};

/// Categories the admin form offers. Stored values outside this list are
/// still served; only newly created products are checked against it.
pub const KNOWN_CATEGORIES: &[&str] = &["Rings", "Necklaces", "Earrings", "Bracelets"];

/// A variant with this many units or fewer is reported as low stock.
pub const LOW_STOCK_THRESHOLD: u32 = 3;

/// Default number of products per catalog page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub best_seller: bool,
    /// Public id of the uploaded primary image, kept so it can be deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_id: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A purchasable configuration of a product with its own stock and images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

/// How a cart line names the variant it wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariantSelector {
    /// Match on color, ignoring case and surrounding whitespace.
    Color(String),
    /// Match on `variantNumber`, or on 1-based position for variants
    /// without an explicit number.
    Number(u32),
}

/// Availability bucket shown next to a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StockStatus {
    Available,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Bucket for a stock count.
    #[must_use]
    pub const fn for_stock(stock: u32) -> Self {
        match stock {
            0 => Self::OutOfStock,
            n if n <= LOW_STOCK_THRESHOLD => Self::LowStock,
            _ => Self::Available,
        }
    }
}

impl Variant {
    /// Human-readable label used in error messages, emails and order items.
    #[must_use]
    pub fn label(&self, position: usize) -> String {
        match (&self.color, self.variant_number) {
            (Some(color), _) if !color.trim().is_empty() => color.trim().to_string(),
            (_, Some(number)) => format!("Variant #{number}"),
            _ => format!("Variant #{}", position + 1),
        }
    }

    /// Whether this variant (at `position` in its product) matches `selector`.
    #[must_use]
    pub fn matches(&self, position: usize, selector: &VariantSelector) -> bool {
        match selector {
            VariantSelector::Color(wanted) => self
                .color
                .as_deref()
                .is_some_and(|color| color.trim().eq_ignore_ascii_case(wanted.trim())),
            VariantSelector::Number(wanted) => match self.variant_number {
                Some(number) => number == *wanted,
                None => u32::try_from(position + 1).is_ok_and(|p| p == *wanted),
            },
        }
    }

    /// Current availability bucket.
    #[must_use]
    pub const fn stock_status(&self) -> StockStatus {
        StockStatus::for_stock(self.stock)
    }
}

impl fmt::Display for VariantSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Color(color) => write!(f, "color={color}"),
            Self::Number(number) => write!(f, "variant={number}"),
        }
    }
}

impl Product {
    /// Find the variant a selector points at, with its position.
    #[must_use]
    pub fn find_variant(&self, selector: &VariantSelector) -> Option<(usize, &Variant)> {
        self.variants
            .iter()
            .enumerate()
            .find(|(position, variant)| variant.matches(*position, selector))
    }

    /// Total units across all variants.
    #[must_use]
    pub fn total_stock(&self) -> u64 {
        self.variants.iter().map(|v| u64::from(v.stock)).sum()
    }

    /// The product as it should be shown to shoppers: variants without images
    /// are dropped, and a product with nothing left to show is hidden.
    #[must_use]
    pub fn displayable(&self) -> Option<Self> {
        let variants: Vec<Variant> = self
            .variants
            .iter()
            .filter(|v| !v.images.is_empty())
            .cloned()
            .collect();
        if variants.is_empty() {
            return None;
        }
        Some(Self {
            variants,
            ..self.clone()
        })
    }
}

/// Id for the next product appended to a catalog, `None` once ids run out.
#[must_use]
pub fn next_product_id(products: &[Product]) -> Option<ProductId> {
    products
        .iter()
        .map(|p| p.id)
        .max()
        .map_or(Some(ProductId::new(1)), |max| max.next())
}

// =============================================================================
// New products
// =============================================================================

/// Product fields submitted by the admin form (`productData`).
///
/// The form posts everything as strings, so numeric fields accept either
/// JSON numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub best_seller: bool,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub stock: u32,
}

/// Reasons a [`NewProduct`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NewProductError {
    #[error("product name is required")]
    MissingName,
    #[error("price must be greater than zero")]
    InvalidPrice,
    #[error("unknown category '{0}' (expected one of Rings, Necklaces, Earrings, Bracelets)")]
    UnknownCategory(String),
}

impl NewProduct {
    /// Check the submitted fields and normalize the category spelling.
    ///
    /// # Errors
    ///
    /// Returns the first [`NewProductError`] the submission violates.
    pub fn validate(mut self) -> Result<Self, NewProductError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(NewProductError::MissingName);
        }
        if self.price.is_negative() || self.price == Price::ZERO {
            return Err(NewProductError::InvalidPrice);
        }
        let category = KNOWN_CATEGORIES
            .iter()
            .find(|known| known.eq_ignore_ascii_case(self.category.trim()))
            .ok_or_else(|| NewProductError::UnknownCategory(self.category.clone()))?;
        self.category = (*category).to_string();
        self.color = self
            .color
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Ok(self)
    }

    /// Build the stored product around an uploaded image.
    #[must_use]
    pub fn into_product(
        self,
        id: ProductId,
        image_url: String,
        cloudinary_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            category: self.category,
            description: self.description,
            trending: self.trending,
            best_seller: self.best_seller,
            cloudinary_id,
            variants: vec![Variant {
                color: self.color,
                variant_number: Some(1),
                stock: self.stock,
                images: vec![image_url],
            }],
            created_at: Some(created_at),
        }
    }
}

/// Accepts `5`, `"5"` and `5.0`; anything else is an error.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let out_of_range = || serde::de::Error::custom("stock must be a whole number >= 0");
    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => u32::try_from(n).map_err(|_| out_of_range()),
        Raw::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked above
            Ok(f as u32)
        }
        Raw::Float(_) => Err(out_of_range()),
        Raw::Text(s) => s.trim().parse::<u32>().map_err(|_| out_of_range()),
    }
}

// =============================================================================
// Catalog queries
// =============================================================================

/// Sort orders offered by the product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SortOrder {
    /// Catalog order as stored.
    #[default]
    #[serde(rename = "recent")]
    Recent,
    #[serde(rename = "priceAsc")]
    PriceAsc,
    #[serde(rename = "priceDesc")]
    PriceDesc,
    #[serde(rename = "trending")]
    Trending,
    #[serde(rename = "bestseller", alias = "bestSeller")]
    BestSeller,
}

/// Filters, sorting and paging for `GET /api/products`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub search: Option<String>,
    /// A category name, or the pseudo-categories `trending` / `bestSeller`.
    pub category: Option<String>,
    pub trending: Option<bool>,
    pub best_seller: Option<bool>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    #[serde(default)]
    pub sort: SortOrder,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// One page of a filtered catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    pub items: Vec<Product>,
    pub total: usize,
    pub pages: usize,
    pub page: usize,
}

impl CatalogQuery {
    fn keeps(&self, product: &Product) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = product.name.to_lowercase().contains(&term)
                || product.description.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }

        match self.category.as_deref().map(str::trim) {
            None | Some("") => {}
            Some(c) if c.eq_ignore_ascii_case("trending") => {
                if !product.trending {
                    return false;
                }
            }
            Some(c) if c.eq_ignore_ascii_case("bestseller") => {
                if !product.best_seller {
                    return false;
                }
            }
            Some(c) => {
                if !product.category.eq_ignore_ascii_case(c) {
                    return false;
                }
            }
        }

        if self.trending.is_some_and(|t| t != product.trending) {
            return false;
        }
        if self.best_seller.is_some_and(|b| b != product.best_seller) {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.price > max) {
            return false;
        }
        true
    }

    /// Filter, sort and paginate `products`.
    ///
    /// Products are first reduced to their displayable form, so hidden
    /// variants never leak into the listing.
    #[must_use]
    pub fn apply(&self, products: &[Product]) -> CatalogPage {
        let mut matched: Vec<Product> = products
            .iter()
            .filter_map(Product::displayable)
            .filter(|p| self.keeps(p))
            .collect();

        // sort_by is stable, so ties keep catalog order
        match self.sort {
            SortOrder::Recent => {}
            SortOrder::PriceAsc => matched.sort_by(|a, b| a.price.cmp(&b.price)),
            SortOrder::PriceDesc => matched.sort_by(|a, b| b.price.cmp(&a.price)),
            SortOrder::Trending => matched.sort_by_key(|p| !p.trending),
            SortOrder::BestSeller => matched.sort_by_key(|p| !p.best_seller),
        }

        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(1).max(1);
        let total = matched.len();
        let pages = total.div_ceil(page_size);
        let items = matched
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        CatalogPage {
            items,
            total,
            pages,
            page,
        }
    }
}

// =============================================================================
// Catalog checks
// =============================================================================

/// A problem found in a stored catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogIssue {
    DuplicateId(ProductId),
    MissingName(ProductId),
    NonPositivePrice(ProductId),
    NoVariants(ProductId),
    VariantWithoutImages { product: ProductId, position: usize },
}

impl CatalogIssue {
    /// Whether the catalog is unusable with this issue. A variant without
    /// images is only hidden from shoppers.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        !matches!(self, Self::VariantWithoutImages { .. })
    }
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "product id {id} appears more than once"),
            Self::MissingName(id) => write!(f, "product {id} has no name"),
            Self::NonPositivePrice(id) => write!(f, "product {id} has a price <= 0"),
            Self::NoVariants(id) => write!(f, "product {id} has no variants"),
            Self::VariantWithoutImages { product, position } => write!(
                f,
                "product {product} variant #{} has no images and will be hidden",
                position + 1
            ),
        }
    }
}

/// Report everything in `products` that would break the storefront.
#[must_use]
pub fn check_catalog(products: &[Product]) -> Vec<CatalogIssue> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for product in products {
        if !seen.insert(product.id) {
            issues.push(CatalogIssue::DuplicateId(product.id));
        }
        if product.name.trim().is_empty() {
            issues.push(CatalogIssue::MissingName(product.id));
        }
        if product.price.is_negative() || product.price == Price::ZERO {
            issues.push(CatalogIssue::NonPositivePrice(product.id));
        }
        if product.variants.is_empty() {
            issues.push(CatalogIssue::NoVariants(product.id));
        }
        for (position, variant) in product.variants.iter().enumerate() {
            if variant.images.is_empty() {
                issues.push(CatalogIssue::VariantWithoutImages {
                    product: product.id,
                    position,
                });
            }
        }
    }
    issues
}
