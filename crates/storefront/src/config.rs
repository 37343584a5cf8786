//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Server
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3001)
//! - `ALLOW_ORIGIN` - Comma-separated CORS origins, or `*` (default: `*`)
//! - `RATE_LIMIT_ENABLED` - Per-IP limits on order endpoints (default: true)
//! - `ADMIN_KEY` - Shared key for the admin endpoints (admin routes answer 401 without it)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error tracking
//!
//! ## Catalog backend
//! - `CATALOG_BACKEND` - `github`, `postgres` or `file` (default: `file`)
//! - GitHub: `GITHUB_TOKEN`/`GH_TOKEN`, `GH_OWNER`/`GITHUB_OWNER`,
//!   `GH_REPO`/`GITHUB_REPO`, `GH_BRANCH`/`GITHUB_BRANCH` (main),
//!   `PRODUCTS_PATH`/`GH_FILE_PATH` (data/products.json),
//!   `ORDERS_PATH` (data/orders.json), `GITHUB_API_URL`
//! - Postgres: `DATABASE_URL`/`SUPABASE_DB_URL`
//! - File: `PRODUCTS_FILE` (public/data/products.json),
//!   `ORDERS_FILE` (public/data/orders.json), `RENDER`
//!
//! ## Media (Cloudinary, optional as a group)
//! - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET`
//! - `CLOUDINARY_FOLDER` (pinkaura-products), `CLOUDINARY_PROOF_FOLDER`
//!   (pinkaura-payment-proofs), `CLOUDINARY_API_URL`
//!
//! ## Email
//! - `EMAIL_PROVIDER` - `sendgrid`, `emailjs` or `none` (default: `none`)
//! - `SENDGRID_API_KEY`, `EMAIL_FROM`, `STORE_OWNER_EMAIL`
//! - `EMAILJS_SERVICE_ID`, `EMAILJS_TEMPLATE_ID`, `EMAILJS_PUBLIC_KEY`, `EMAILJS_PRIVATE_KEY`
//!
//! ## Pricing
//! - `SHIPPING_COST` (60), `FREE_SHIPPING_THRESHOLD` (999), `TOTAL_TOLERANCE` (1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use pinkaura_core::{Price, ShippingPolicy};
use secrecy::SecretString;
use thiserror::Error;

const MIN_ADMIN_KEY_LENGTH: usize = 16;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Origins allowed by CORS
    pub allowed_origins: AllowedOrigins,
    /// Whether order endpoints are rate limited per client IP
    pub rate_limit_enabled: bool,
    /// Key expected in `x-admin-key`; admin routes are closed without it
    pub admin_key: Option<SecretString>,
    /// Where products and orders live
    pub backend: BackendConfig,
    /// Image hosting; uploads fail with an upstream error when absent
    pub cloudinary: Option<CloudinaryConfig>,
    /// Order emails
    pub email: EmailConfig,
    /// Shipping fee, free-shipping threshold and total tolerance
    pub pricing: ShippingPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// CORS origin policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

/// Catalog/order backend selection.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    GitHub(GitHubConfig),
    Postgres { database_url: SecretString },
    File(FileConfig),
}

impl BackendConfig {
    /// Short name used in logs and the health endpoint.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GitHub(_) => "github",
            Self::Postgres { .. } => "postgres",
            Self::File(_) => "file",
        }
    }
}

/// GitHub Contents API settings.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct GitHubConfig {
    pub token: SecretString,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub products_path: String,
    pub orders_path: String,
    pub api_url: String,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"[REDACTED]")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("products_path", &self.products_path)
            .field("orders_path", &self.orders_path)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Local JSON file locations.
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub products_file: PathBuf,
    pub orders_file: PathBuf,
    /// Running on a host whose disk is wiped on restart (Render free tier)
    pub ephemeral: bool,
}

/// Cloudinary credentials and folders.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
    pub product_folder: String,
    pub proof_folder: String,
    pub api_url: String,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("product_folder", &self.product_folder)
            .field("proof_folder", &self.proof_folder)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Email settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    /// Receives a copy of every order notification
    pub store_owner_email: Option<String>,
}

/// Email delivery service.
#[derive(Debug, Clone)]
pub enum EmailProvider {
    Disabled,
    SendGrid {
        api_key: SecretString,
        from: String,
        api_url: String,
    },
    EmailJs {
        service_id: String,
        template_id: String,
        public_key: String,
        private_key: Option<SecretString>,
        api_url: String,
    },
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the admin key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("HOST", "127.0.0.1")?;
        let port = parse_env("PORT", "3001")?;
        let allowed_origins = AllowedOrigins::parse(&get_env_or_default("ALLOW_ORIGIN", "*"));
        let rate_limit_enabled = parse_bool_env("RATE_LIMIT_ENABLED", true)?;

        let admin_key = match get_optional_env("ADMIN_KEY") {
            Some(key) => {
                validate_admin_key(&key, "ADMIN_KEY")?;
                Some(SecretString::from(key))
            }
            None => None,
        };

        let backend = BackendConfig::from_env()?;
        let cloudinary = CloudinaryConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let pricing = ShippingPolicy {
            flat_fee: parse_env::<Price>("SHIPPING_COST", "60")?,
            free_threshold: parse_env::<Price>("FREE_SHIPPING_THRESHOLD", "999")?,
            tolerance: parse_env::<Price>("TOTAL_TOLERANCE", "1")?,
        };

        Ok(Self {
            host,
            port,
            allowed_origins,
            rate_limit_enabled,
            admin_key,
            backend,
            cloudinary,
            email,
            pricing,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Configuration for a server backed by local JSON files, with no media
    /// host, no email and no rate limiting. Used for local runs and tests.
    #[must_use]
    pub fn local_files(products_file: PathBuf, orders_file: PathBuf) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3001,
            allowed_origins: AllowedOrigins::Any,
            rate_limit_enabled: false,
            admin_key: None,
            backend: BackendConfig::File(FileConfig {
                products_file,
                orders_file,
                ephemeral: false,
            }),
            cloudinary: None,
            email: EmailConfig {
                provider: EmailProvider::Disabled,
                store_owner_email: None,
            },
            pricing: ShippingPolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AllowedOrigins {
    fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let kind = get_env_or_default("CATALOG_BACKEND", "file").to_ascii_lowercase();
        match kind.as_str() {
            "github" => Ok(Self::GitHub(GitHubConfig {
                token: SecretString::from(get_required_env_any(&["GITHUB_TOKEN", "GH_TOKEN"])?),
                owner: get_required_env_any(&["GH_OWNER", "GITHUB_OWNER"])?,
                repo: get_required_env_any(&["GH_REPO", "GITHUB_REPO"])?,
                branch: get_optional_env_any(&["GH_BRANCH", "GITHUB_BRANCH"])
                    .unwrap_or_else(|| "main".to_string()),
                products_path: get_optional_env_any(&["PRODUCTS_PATH", "GH_FILE_PATH"])
                    .unwrap_or_else(|| "data/products.json".to_string()),
                orders_path: get_env_or_default("ORDERS_PATH", "data/orders.json"),
                api_url: get_env_or_default("GITHUB_API_URL", "https://api.github.com"),
            })),
            "postgres" | "supabase" => Ok(Self::Postgres {
                database_url: SecretString::from(get_required_env_any(&[
                    "DATABASE_URL",
                    "SUPABASE_DB_URL",
                ])?),
            }),
            "file" => Ok(Self::File(FileConfig {
                products_file: get_env_or_default("PRODUCTS_FILE", "public/data/products.json")
                    .into(),
                orders_file: get_env_or_default("ORDERS_FILE", "public/data/orders.json").into(),
                ephemeral: parse_bool_env("RENDER", false)?,
            })),
            other => Err(ConfigError::InvalidEnvVar(
                "CATALOG_BACKEND".to_string(),
                format!("expected github, postgres or file, got '{other}'"),
            )),
        }
    }
}

impl CloudinaryConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(cloud_name) = get_optional_env("CLOUDINARY_CLOUD_NAME") else {
            return Ok(None);
        };
        Ok(Some(Self {
            cloud_name,
            api_key: get_required_env("CLOUDINARY_API_KEY")?,
            api_secret: SecretString::from(get_required_env("CLOUDINARY_API_SECRET")?),
            product_folder: get_env_or_default("CLOUDINARY_FOLDER", "pinkaura-products"),
            proof_folder: get_env_or_default("CLOUDINARY_PROOF_FOLDER", "pinkaura-payment-proofs"),
            api_url: get_env_or_default("CLOUDINARY_API_URL", "https://api.cloudinary.com"),
        }))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let provider = match get_env_or_default("EMAIL_PROVIDER", "none")
            .to_ascii_lowercase()
            .as_str()
        {
            "none" | "" => EmailProvider::Disabled,
            "sendgrid" => EmailProvider::SendGrid {
                api_key: SecretString::from(get_required_env("SENDGRID_API_KEY")?),
                from: get_required_env("EMAIL_FROM")?,
                api_url: get_env_or_default("SENDGRID_API_URL", "https://api.sendgrid.com"),
            },
            "emailjs" => EmailProvider::EmailJs {
                service_id: get_required_env("EMAILJS_SERVICE_ID")?,
                template_id: get_required_env("EMAILJS_TEMPLATE_ID")?,
                public_key: get_required_env("EMAILJS_PUBLIC_KEY")?,
                private_key: get_optional_env("EMAILJS_PRIVATE_KEY").map(SecretString::from),
                api_url: get_env_or_default("EMAILJS_API_URL", "https://api.emailjs.com"),
            },
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "EMAIL_PROVIDER".to_string(),
                    format!("expected sendgrid, emailjs or none, got '{other}'"),
                ));
            }
        };
        Ok(Self {
            provider,
            store_owner_email: get_optional_env("STORE_OWNER_EMAIL"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get the first set variable among `keys` (primary name, then aliases).
fn get_required_env_any(keys: &[&str]) -> Result<String, ConfigError> {
    get_optional_env_any(keys)
        .ok_or_else(|| ConfigError::MissingEnvVar(keys.first().copied().unwrap_or("").to_string()))
}

fn get_optional_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| get_optional_env(key))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match get_optional_env(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected true or false, got '{v}'"),
            )),
        },
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject admin keys that are short, placeholders, or low entropy.
fn validate_admin_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    if key.len() < MIN_ADMIN_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_ADMIN_KEY_LENGTH} characters (got {})",
                key.len()
            ),
        ));
    }

    let lower = key.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(key);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}
