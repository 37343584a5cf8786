//! Pinkaura Storefront library.
//!
//! The HTTP API for the catalog and order placement, split out from the
//! binary so the integration tests can drive the router directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
