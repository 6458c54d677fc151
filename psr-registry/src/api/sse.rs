//! Live notification stream

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/events - one `ScoreRecorded` frame per successful write
///
/// Frames carry the audit sequence as their SSE id; clients that reconnect or
/// lag backfill from `/api/audit`.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    psr_common::sse::registry_event_stream(state.store.events(), "psr-registry")
}
