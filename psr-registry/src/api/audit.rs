//! Audit log endpoints
//!
//! The audit log is the durable, ordered notification record. Indexers page
//! through it with `after` set to the last sequence they processed.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEntry, AuditHead, ChainVerification};
use crate::AppState;

const DEFAULT_PAGE: usize = 100;
const MAX_PAGE: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Return entries with sequence strictly greater than this
    #[serde(default)]
    pub after: u64,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub head: AuditHead,
}

/// GET /api/audit?after=N&limit=M
pub async fn get_audit_entries(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<AuditPage> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);

    Json(AuditPage {
        entries: state.store.audit_entries_after(query.after, limit),
        head: state.store.audit_head(),
    })
}

/// GET /api/audit/head
pub async fn get_audit_head(State(state): State<AppState>) -> Json<AuditHead> {
    Json(state.store.audit_head())
}

/// GET /api/audit/verify
pub async fn verify_audit(State(state): State<AppState>) -> Json<ChainVerification> {
    Json(state.store.verify_audit())
}
