//! Admin key extractor.
//!
//! Admin endpoints require the `x-admin-key` header to equal the configured
//! `ADMIN_KEY`. With no key configured every admin request is refused.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

/// The HTTP header carrying the admin key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Extractor that requires a valid admin key.
///
/// # Example
///
/// ```rust,ignore
/// async fn delete_product(_admin: RequireAdmin, Path(id): Path<ProductId>) -> Result<...> {
///     // only reached with the right key
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_admin_key(&parts.headers, state)?;
        Ok(Self)
    }
}

/// Check the `x-admin-key` header against the configured key.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if no key is configured or the header
/// does not match.
pub fn check_admin_key(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let Some(expected) = state.config().admin_key.as_ref() else {
        tracing::warn!("Admin request refused: ADMIN_KEY not set");
        return Err(AppError::Unauthorized("Admin access is disabled".to_string()));
    };

    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if keys_match(provided, expected.expose_secret()) {
        Ok(())
    } else {
        tracing::debug!("Admin request with wrong key");
        Err(AppError::Unauthorized("Invalid admin key".to_string()))
    }
}

/// Constant-time comparison so response timing does not leak the key.
fn keys_match(provided: &str, expected: &str) -> bool {
    !provided.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("k3y-With-Entropy!", "k3y-With-Entropy!"));
        assert!(!keys_match("k3y-With-Entropy?", "k3y-With-Entropy!"));
        assert!(!keys_match("short", "k3y-With-Entropy!"));
        assert!(!keys_match("", ""));
    }
}
