//! Business logic and external service clients.
//!
//! # Services
//!
//! - `orders` - Order placement and the stock-only checkout
//! - `media` - Cloudinary uploads and deletes
//! - `email` - Order emails through SendGrid or EmailJS

pub mod email;
pub mod media;
pub mod orders;
