//! Authentication middleware for mutating routes
//!
//! Verifies the request timestamp and the SHA-256 body hash against the shared
//! secret. This proves possession of the channel secret only; the writer
//! identity in the body is checked by the store's access controller.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use psr_common::api::{validate_hash, validate_timestamp, ApiAuthError, AuthFields, ErrorResponse};
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Authentication middleware
///
/// A shared secret of 0 disables the check.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiAuthError::ParseError(format!("Failed to read body: {}", e)))?;

    let json_value: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| ApiAuthError::ParseError(format!("Invalid JSON: {}", e)))?;

    let fields = auth_fields(&json_value)?;

    let now = state.clock.now().timestamp_millis();
    validate_timestamp(fields.timestamp, now, state.auth_window_ms)?;

    validate_hash(&fields.hash, &json_value, state.shared_secret).map_err(|e| {
        if let ApiAuthError::InvalidHash {
            provided,
            calculated,
        } = &e
        {
            warn!(
                "Hash validation failed: provided={}, calculated={}",
                provided, calculated
            );
        }
        e
    })?;

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}

fn auth_fields(json_value: &Value) -> Result<AuthFields, ApiAuthError> {
    if json_value.get("timestamp").is_none() {
        return Err(ApiAuthError::MissingTimestamp);
    }
    if json_value.get("hash").is_none() {
        return Err(ApiAuthError::MissingHash);
    }
    serde_json::from_value(json_value.clone())
        .map_err(|e| ApiAuthError::ParseError(format!("Malformed auth fields: {}", e)))
}

/// Channel authentication failure
#[derive(Debug)]
pub struct AuthError(pub ApiAuthError);

impl From<ApiAuthError> for AuthError {
    fn from(err: ApiAuthError) -> Self {
        AuthError(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApiAuthError::InvalidTimestamp { .. } | ApiAuthError::InvalidHash { .. } => {
                StatusCode::UNAUTHORIZED
            }
            ApiAuthError::MissingTimestamp
            | ApiAuthError::MissingHash
            | ApiAuthError::ParseError(_) => StatusCode::BAD_REQUEST,
            ApiAuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        warn!("Rejected request: {}", self.0);
        let body = match &self.0 {
            ApiAuthError::InvalidTimestamp { timestamp, now, .. } => ErrorResponse::with_details(
                self.0.code(),
                self.0.to_string(),
                json!({ "timestamp": timestamp, "server_time": now }),
            ),
            other => ErrorResponse::new(other.code(), other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
