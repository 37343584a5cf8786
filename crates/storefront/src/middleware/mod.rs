//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. API headers (`Cache-Control: no-store`, nosniff)
//! 6. Rate limiting on order routes (governor)

pub mod admin_key;
pub mod api_headers;
pub mod rate_limit;
pub mod request_id;

pub use admin_key::{ADMIN_KEY_HEADER, RequireAdmin, check_admin_key};
pub use api_headers::api_headers_middleware;
pub use rate_limit::order_rate_limiter;
pub use request_id::request_id_middleware;
