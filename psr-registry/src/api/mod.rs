//! HTTP API handlers for psr-registry

pub mod audit;
pub mod auth;
pub mod buildinfo;
pub mod health;
pub mod registry;
pub mod scores;
pub mod sse;

pub use audit::{get_audit_entries, get_audit_head, verify_audit};
pub use auth::auth_middleware;
pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use registry::{derive_pitch_id, get_registry_info};
pub use scores::{get_score, record_score};
pub use sse::event_stream;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use psr_common::api::ErrorResponse;

use crate::error::RegistryError;

/// Handler error
#[derive(Debug)]
pub enum ApiError {
    /// Domain failure from the store
    Registry(RegistryError),
    /// Request could not be decoded
    InvalidInput(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Registry(err)
    }
}

/// HTTP status for each registry failure
pub fn status_for(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        RegistryError::DuplicateEntry(_) => StatusCode::CONFLICT,
        RegistryError::InvalidScore => StatusCode::UNPROCESSABLE_ENTITY,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Registry(err) => (
                status_for(&err),
                ErrorResponse::new(err.kind(), err.to_string()),
            ),
            ApiError::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_input", message),
            ),
        };

        (status, Json(body)).into_response()
    }
}
