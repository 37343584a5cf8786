//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::config::StorefrontConfig;
use crate::services::email::{EmailError, Mailer};
use crate::services::media::{CloudinaryClient, MediaError};
use crate::store::{CatalogSnapshot, CatalogStore, StoreError};

/// How long a catalog read is served from memory.
const CATALOG_TTL: Duration = Duration::from_secs(30);

const CATALOG_KEY: &str = "catalog";

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("media client: {0}")]
    Media(#[from] MediaError),
    #[error("email client: {0}")]
    Email(#[from] EmailError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// catalog store, external clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: CatalogStore,
    media: Option<CloudinaryClient>,
    mailer: Mailer,
    catalog_cache: Cache<&'static str, Arc<CatalogSnapshot>>,
}

impl AppState {
    /// Connect the configured backend and build the HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened or a client fails to
    /// build.
    pub async fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let store = CatalogStore::connect(&config.backend).await?;
        Self::with_store(config, store)
    }

    /// Build state around an already opened store.
    ///
    /// # Errors
    ///
    /// Returns an error if a client fails to build.
    pub fn with_store(config: StorefrontConfig, store: CatalogStore) -> Result<Self, StateError> {
        let media = config
            .cloudinary
            .as_ref()
            .map(CloudinaryClient::new)
            .transpose()?;
        let mailer = Mailer::new(&config.email)?;
        let catalog_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(CATALOG_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                media,
                mailer,
                catalog_cache,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog and order store.
    #[must_use]
    pub fn store(&self) -> &CatalogStore {
        &self.inner.store
    }

    /// The image host client.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::NotConfigured` when Cloudinary is not set up.
    pub fn media(&self) -> Result<&CloudinaryClient, MediaError> {
        self.inner.media.as_ref().ok_or(MediaError::NotConfigured)
    }

    /// The image host client, if configured.
    #[must_use]
    pub fn media_if_configured(&self) -> Option<&CloudinaryClient> {
        self.inner.media.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }

    /// Catalog for read-only listings, served from a short-lived cache.
    ///
    /// Checkout does not use this; it always reads the store directly.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the catalog must be loaded and cannot be.
    pub async fn cached_catalog(&self) -> Result<Arc<CatalogSnapshot>, StoreError> {
        if let Some(snapshot) = self.inner.catalog_cache.get(&CATALOG_KEY).await {
            debug!("Cache hit for catalog");
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.store().load_catalog().await?);
        self.inner
            .catalog_cache
            .insert(CATALOG_KEY, Arc::clone(&snapshot))
            .await;
        Ok(snapshot)
    }

    /// Drop the cached catalog after a write.
    pub async fn invalidate_catalog(&self) {
        self.inner.catalog_cache.invalidate(&CATALOG_KEY).await;
    }
}
