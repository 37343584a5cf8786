//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error body has the same shape so the client only ever checks one
//! boolean:
//!
//! ```json
//! { "success": false, "message": "Insufficient stock for Rose Ring (Gold). Have 1, need 2" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pinkaura_core::{CheckoutError, CustomerError, FieldProblem};
use serde::Serialize;
use thiserror::Error;

use crate::services::media::MediaError;
use crate::store::StoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart failed server-side revalidation.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Customer details failed validation.
    #[error(transparent)]
    Customer(#[from] CustomerError),

    /// Catalog or order store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Image host failed.
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or wrong admin key.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldProblem]>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => {
                if err.is_conflict() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            Self::Customer(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(err) => match err {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Conflict(_) | StoreError::Stock(_) => StatusCode::CONFLICT,
                StoreError::GitHub(_) => StatusCode::BAD_GATEWAY,
                StoreError::Database(_)
                | StoreError::Io(_)
                | StoreError::Json(_)
                | StoreError::DataCorruption(_)
                | StoreError::IdsExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Media(err) => match err {
                MediaError::InvalidImage(_) => StatusCode::BAD_REQUEST,
                MediaError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Checkout(err) => err.to_string(),
            Self::Customer(err) => err.to_string(),
            Self::Store(StoreError::NotFound(what)) => format!("{what} not found"),
            Self::Store(StoreError::Conflict(_)) => {
                "The catalog changed while saving. Reload and try again.".to_string()
            }
            Self::Store(StoreError::Stock(err)) => err.to_string(),
            Self::Store(StoreError::GitHub(_)) => "External service error".to_string(),
            Self::Media(MediaError::InvalidImage(msg)) => msg.clone(),
            Self::Media(MediaError::NotConfigured) => "Image uploads are not configured".to_string(),
            Self::Media(_) => "Image upload failed".to_string(),
            Self::Store(_) => "Internal server error".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let fields = match &self {
            Self::Customer(err) => Some(err.problems.as_slice()),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            message: self.public_message(),
            fields,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for an order-flow step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use pinkaura_core::{ProductId, VariantSelector};

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product 7".to_string());
        assert_eq!(err.to_string(), "Not found: Product 7");
    }

    #[test]
    fn test_checkout_status_codes() {
        let conflict = AppError::from(CheckoutError::InsufficientStock {
            name: "Ring".into(),
            variant: "Gold".into(),
            available: 1,
            requested: 2,
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let bad = AppError::from(CheckoutError::UnknownVariant {
            product: ProductId::new(1),
            selector: VariantSelector::Color("Blue".into()),
        });
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_status_codes() {
        assert_eq!(
            AppError::from(StoreError::NotFound("Order 3".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::Conflict("stale sha".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(StoreError::DataCorruption("bad json".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_body_shape() {
        let (status, json) = body_json(AppError::BadRequest("Missing cartItems".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Missing cartItems");
        assert!(json.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, json) =
            body_json(StoreError::DataCorruption("orders.json line 3".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_customer_error_lists_fields() {
        let err = CustomerError {
            problems: vec![FieldProblem {
                field: "pincode",
                message: "Enter a valid 6-digit PIN code",
            }],
        };
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["fields"][0]["field"], "pincode");
    }
}
