//! Registry information and pitch identifier helper

use axum::{extract::State, Json};
use psr_common::{Identity, PitchId};
use serde::{Deserialize, Serialize};

use crate::audit::AuditHead;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryInfo {
    /// The single authorized writer; omitted while channel auth is disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Identity>,
    pub records: usize,
    pub audit_head: AuditHead,
}

/// GET /api/registry
pub async fn get_registry_info(State(state): State<AppState>) -> Json<RegistryInfo> {
    Json(RegistryInfo {
        owner: (state.shared_secret != 0).then(|| state.store.access().owner().clone()),
        records: state.store.len(),
        audit_head: state.store.audit_head(),
    })
}

#[derive(Debug, Deserialize)]
pub struct PitchContent {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PitchIdResponse {
    pub pitch_id: PitchId,
}

/// POST /api/pitch-id
///
/// Computes the content-hash identifier for a pitch. Does not touch the store.
pub async fn derive_pitch_id(Json(body): Json<PitchContent>) -> Json<PitchIdResponse> {
    Json(PitchIdResponse {
        pitch_id: PitchId::digest(body.content.as_bytes()),
    })
}
