//! Health check.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;
use crate::store::CatalogStore;

const FILE_STORAGE_WARNING: &str = "Local file storage: on ephemeral hosts such as Render \
     products and orders do not survive a restart or redeploy";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    success: bool,
    status: &'static str,
    storage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'static str>,
}

/// Liveness check naming the storage backend.
///
/// GET /api/health
///
/// Does not touch the backend.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store();
    Json(HealthResponse {
        success: true,
        status: "ok",
        storage: store.backend_name(),
        warning: matches!(store, CatalogStore::File(_)).then_some(FILE_STORAGE_WARNING),
    })
}
