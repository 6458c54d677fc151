//! psr-registry library - Pitch Score Registry
//!
//! Write-once, tamper-evident registry of pitch scoring results. A single
//! authorized writer records one immutable score per pitch identifier; anyone
//! may read. Every successful write is appended to a hash-chained audit log
//! and broadcast to live subscribers.

use std::sync::Arc;

use axum::Router;
use psr_common::Clock;
use tower_http::trace::TraceLayer;

pub mod access;
pub mod api;
pub mod audit;
pub mod error;
pub mod journal;
pub mod record;
pub mod store;

pub use access::AccessController;
pub use audit::{AuditEntry, AuditHead, AuditLog, ChainVerification};
pub use error::RegistryError;
pub use journal::{JournalEntry, JournalError, MemoryJournal, ScoreJournal, SqliteJournal};
pub use record::{ExecutionContext, ScoreRecord, ScoreSubmission, WriteReceipt};
pub use store::ScoreStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ScoreStore>,
    /// Stamps records and checks request timestamps
    pub clock: Arc<dyn Clock>,
    /// Shared secret for API authentication (0 disables it)
    pub shared_secret: i64,
    pub auth_window_ms: i64,
}

impl AppState {
    pub fn new(
        store: Arc<ScoreStore>,
        clock: Arc<dyn Clock>,
        shared_secret: i64,
        auth_window_ms: i64,
    ) -> Self {
        Self {
            store,
            clock,
            shared_secret,
            auth_window_ms,
        }
    }
}

/// Build application router
///
/// Only the score write is behind request authentication; reads, the audit
/// log, and event streams are public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/scores", post(api::record_score))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/api/scores/:pitch_id", get(api::get_score))
        .route("/api/audit", get(api::get_audit_entries))
        .route("/api/audit/head", get(api::get_audit_head))
        .route("/api/audit/verify", get(api::verify_audit))
        .route("/api/events", get(api::event_stream))
        .route("/api/registry", get(api::get_registry_info))
        .route("/api/pitch-id", post(api::derive_pitch_id))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
