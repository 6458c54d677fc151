//! Server-Sent Events (SSE) utilities
//!
//! Turns an [`EventBus`] subscription into an axum SSE response.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::events::{EventBus, RegistryEvent};

const KEEP_ALIVE_SECS: u64 = 15;

/// Stream every future registry event to one SSE client
///
/// The first frame is a `ConnectionStatus` event. A client that falls behind
/// receives a `Lagged` event carrying the number of missed notifications and
/// should backfill from the audit log.
pub fn registry_event_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let rx = bus.subscribe();

    let connected = stream::once(async {
        Ok::<Event, Infallible>(Event::default().event("ConnectionStatus").data("connected"))
    });

    let events = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => to_sse_event(&event).map(Ok),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!("SSE client lagged, {} notifications skipped", missed);
                Some(Ok(Event::default().event("Lagged").data(missed.to_string())))
            }
        }
    });

    Sse::new(connected.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("heartbeat"),
    )
}

/// Serialize one registry event into an SSE frame
///
/// The SSE `id` is the audit sequence so clients can resume from it.
pub fn to_sse_event(event: &RegistryEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => {
            debug!("Broadcasting SSE event: {}", event.event_type());
            Some(
                Event::default()
                    .event(event.event_type())
                    .id(event.sequence().to_string())
                    .data(json),
            )
        }
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
