//! Request body extractors.
//!
//! The order and product forms mix JSON-encoded text fields with a single
//! image. Fields are read whole into memory; the body limit set on the router
//! bounds their size. JSON bodies go through [`JsonBody`] so malformed input
//! gets the same error shape as every other failure.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::services::media::ImageUpload;

/// Text fields and file parts of a submitted form.
#[derive(Debug, Default)]
pub struct FormParts {
    text: HashMap<String, String>,
    files: HashMap<String, ImageUpload>,
}

impl FormParts {
    /// Read every part of `multipart`.
    ///
    /// Parts with a filename are kept as files, everything else as text.
    /// Unnamed parts are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the body is not valid multipart.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut parts = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(filename) = field.file_name().map(str::to_string) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                parts.files.insert(
                    name,
                    ImageUpload {
                        bytes: bytes.to_vec(),
                        filename,
                        content_type,
                    },
                );
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                parts.text.insert(name, value);
            }
        }

        Ok(parts)
    }

    /// Take a file part.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the part if it is missing or empty.
    pub fn take_file(&mut self, name: &str) -> Result<ImageUpload, AppError> {
        self.files
            .remove(name)
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("Missing {name}")))
    }

    /// Parse a text part as JSON.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the part if it is missing or is
    /// not JSON of the expected shape.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T, AppError> {
        let raw = self
            .text
            .get(name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("Missing {name}")))?;

        serde_json::from_str(raw).map_err(|e| {
            tracing::debug!(field = name, error = %e, "Rejected form field");
            AppError::BadRequest(format!("Invalid {name}"))
        })
    }
}

/// `Json` extractor whose rejection is an `AppError`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}
