//! Score write and read endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use psr_common::{Identity, PitchId};
use serde::Deserialize;

use super::ApiError;
use crate::record::{ExecutionContext, ScoreRecord, ScoreSubmission, WriteReceipt};
use crate::AppState;

/// Body of `POST /api/scores`
///
/// `timestamp` and `hash` are consumed by the auth middleware and ignored here.
#[derive(Debug, Deserialize)]
pub struct RecordScoreRequest {
    /// Identity the write is made as
    pub caller: Identity,
    #[serde(flatten)]
    pub submission: ScoreSubmission,
}

/// POST /api/scores
///
/// 201 with the write receipt, or the specific failure kind.
pub async fn record_score(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<WriteReceipt>), ApiError> {
    let request: RecordScoreRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid score submission: {}", e)))?;

    let ctx = ExecutionContext::new(request.caller, state.clock.clone());
    let receipt = state.store.record_score(&ctx, request.submission).await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/scores/:pitch_id
pub async fn get_score(
    State(state): State<AppState>,
    Path(pitch_id): Path<String>,
) -> Result<Json<ScoreRecord>, ApiError> {
    let pitch_id = PitchId::from_hex(&pitch_id)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid pitch id: {}", e)))?;

    Ok(Json(state.store.get_score(&pitch_id)?))
}
