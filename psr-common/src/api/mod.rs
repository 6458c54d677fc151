//! Shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//! - Shared types
//!
//! The service crate wraps these with axum middleware and handlers.

pub mod auth;
pub mod types;

#[cfg(feature = "sqlx")]
pub use auth::{initialize_shared_secret, load_shared_secret};
pub use auth::{
    calculate_hash, sign_body, to_canonical_json, validate_hash, validate_timestamp, ApiAuthError,
};
pub use types::{AuthFields, ErrorResponse};
