//! Cloudinary image hosting.
//!
//! Product photos and payment-proof screenshots are uploaded with signed
//! requests. Signatures are SHA-256 over the alphabetically sorted
//! `key=value` parameters joined by `&`, with the API secret appended.

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::CloudinaryConfig;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Formats accepted for product photos.
const PRODUCT_IMAGE_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
    ("image/gif", &["gif"]),
];

/// Errors from the image host.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The upload was rejected before reaching the host.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// No Cloudinary credentials configured.
    #[error("Image hosting is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// An image received from a client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl ImageUpload {
    /// Accept any `image/*` up to [`MAX_IMAGE_BYTES`]. Used for payment proofs.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::InvalidImage` describing the problem.
    pub fn check_any_image(&self) -> Result<(), MediaError> {
        self.check_size()?;
        if !self.content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(MediaError::InvalidImage(format!(
                "Expected an image, got {}",
                self.content_type
            )));
        }
        Ok(())
    }

    /// Accept jpg, jpeg, png, webp or gif up to [`MAX_IMAGE_BYTES`]. Either
    /// the content type or the file extension must name one of them.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::InvalidImage` describing the problem.
    pub fn check_product_image(&self) -> Result<(), MediaError> {
        self.check_size()?;
        let content_type = self.content_type.to_ascii_lowercase();
        let extension = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let allowed = PRODUCT_IMAGE_TYPES
            .iter()
            .any(|(mime, exts)| content_type == *mime || exts.contains(&extension.as_str()));
        if allowed {
            Ok(())
        } else {
            Err(MediaError::InvalidImage(
                "Only jpg, jpeg, png, webp and gif images are allowed".to_string(),
            ))
        }
    }

    fn check_size(&self) -> Result<(), MediaError> {
        if self.bytes.is_empty() {
            return Err(MediaError::InvalidImage("Image is empty".to_string()));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(MediaError::InvalidImage(format!(
                "Image is larger than {} MB",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

/// A hosted image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Signed Cloudinary upload/destroy client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    api_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    product_folder: String,
    proof_folder: String,
}

impl CloudinaryClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            product_folder: config.product_folder.clone(),
            proof_folder: config.proof_folder.clone(),
        })
    }

    #[must_use]
    pub fn product_folder(&self) -> &str {
        &self.product_folder
    }

    #[must_use]
    pub fn proof_folder(&self) -> &str {
        &self.proof_folder
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1_1/{}/image/{action}", self.api_url, self.cloud_name)
    }

    /// Upload an image into `folder`.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Api` if Cloudinary rejects the upload, or
    /// `MediaError::Http` if the request fails.
    #[instrument(skip(self, image), fields(filename = %image.filename, bytes = image.bytes.len()))]
    pub async fn upload(&self, image: ImageUpload, folder: &str) -> Result<UploadedImage, MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", folder), ("timestamp", &timestamp)],
            &self.api_secret,
        );

        let part = Part::bytes(image.bytes)
            .file_name(image.filename)
            .mime_str(&image.content_type)
            .map_err(|e| MediaError::InvalidImage(format!("Bad content type: {e}")))?;
        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadedImage = response.json().await?;
        debug!(public_id = %uploaded.public_id, "Image uploaded");
        Ok(uploaded)
    }

    /// Delete a hosted image. A missing image is not an error.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Api` if Cloudinary rejects the request, or
    /// `MediaError::Http` if the request fails.
    #[instrument(skip(self))]
    pub async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            &self.api_secret,
        );
        let params = [
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: DestroyResponse = response.json().await?;
        if body.result != "ok" {
            debug!(public_id, result = %body.result, "Image not deleted");
        }
        Ok(())
    }

    /// Delete an image in the background, logging failures.
    pub fn spawn_destroy(&self, public_id: String) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.destroy(&public_id).await {
                warn!(error = %e, public_id = %public_id, "Failed to delete hosted image");
            }
        });
    }
}

/// Request signature over `params` (any order) and the API secret.
fn sign(params: &[(&str, &str)], secret: &SecretString) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.expose_secret().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> CloudinaryClient {
        CloudinaryClient::new(&CloudinaryConfig {
            cloud_name: "pinkaura".into(),
            api_key: "123456".into(),
            api_secret: SecretString::from("abcd"),
            product_folder: "pinkaura-products".into(),
            proof_folder: "pinkaura-payment-proofs".into(),
            api_url: server.uri(),
        })
        .unwrap()
    }

    // ASCII filler keeps the multipart body matchable as a string.
    fn upload(filename: &str, content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            bytes: vec![b'x'; len],
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }

    #[test]
    fn test_signature_sorts_params() {
        let secret = SecretString::from("abcd");
        let expected = "c9800e1a5ec53dbcb4ade5d2c470294f2838962e24b51e7456f1cf473244423d";
        assert_eq!(
            sign(&[("timestamp", "1700000000"), ("folder", "pinkaura-products")], &secret),
            expected
        );
        assert_eq!(
            sign(&[("folder", "pinkaura-products"), ("timestamp", "1700000000")], &secret),
            expected
        );
        assert_eq!(
            sign(
                &[("public_id", "pinkaura-products/ring"), ("timestamp", "1700000000")],
                &secret
            ),
            "fdc876567e92c0026cad6416892a59f8d181f74f82b15bdb15a5a1d8c7962a62"
        );
    }

    #[test]
    fn test_product_image_rules() {
        assert!(upload("ring.JPG", "application/octet-stream", 10).check_product_image().is_ok());
        assert!(upload("ring", "image/webp", 10).check_product_image().is_ok());
        assert!(upload("ring.svg", "image/svg+xml", 10).check_product_image().is_err());
        assert!(
            upload("ring.png", "image/png", MAX_IMAGE_BYTES + 1)
                .check_product_image()
                .is_err()
        );
    }

    #[test]
    fn test_proof_accepts_any_image_type() {
        assert!(upload("proof.heic", "image/heic", 10).check_any_image().is_ok());
        assert!(upload("proof.pdf", "application/pdf", 10).check_any_image().is_err());
        assert!(upload("proof.png", "image/png", 0).check_any_image().is_err());
    }

    #[tokio::test]
    async fn test_upload_returns_secure_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/pinkaura/image/upload"))
            .and(body_string_contains("pinkaura-payment-proofs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secure_url": "https://res.cloudinary.com/pinkaura/image/upload/v1/proof.png",
                "public_id": "pinkaura-payment-proofs/proof",
                "format": "png"
            })))
            .mount(&server)
            .await;

        let uploaded = client_for(&server)
            .upload(upload("proof.png", "image/png", 64), "pinkaura-payment-proofs")
            .await
            .unwrap();
        assert_eq!(uploaded.public_id, "pinkaura-payment-proofs/proof");
        assert!(uploaded.url.starts_with("https://res.cloudinary.com/"));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"signature\""));
        assert!(body.contains("name=\"api_key\""));
    }

    #[tokio::test]
    async fn test_upload_rejection_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/pinkaura/image/upload"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Invalid Signature"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .upload(upload("ring.png", "image/png", 64), "pinkaura-products")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_destroy_posts_public_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/pinkaura/image/destroy"))
            .and(body_string_contains("public_id=pinkaura-products%2Fring"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).destroy("pinkaura-products/ring").await.unwrap();
    }
}
