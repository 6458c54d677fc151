//! Event types for the PSR notification stream
//!
//! Provides the registry event definitions and the in-process EventBus used to
//! fan notifications out to live subscribers (SSE clients, indexers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::ids::{Identity, PitchId, ProofReference};

/// Public fields of a newly recorded score
///
/// Emitted exactly once per successful write. Field values always match the
/// persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecorded {
    pub pitch_id: PitchId,
    pub overall_score: u32,
    pub proof_reference: ProofReference,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Identity,
}

/// Registry event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    /// A score was recorded
    ///
    /// Triggers:
    /// - SSE: Push to connected clients
    /// - Indexers: Append to external views without polling the store
    ScoreRecorded {
        /// Position in the audit chain (1-based, gap-free)
        sequence: u64,
        /// Audit chain hash of the entry carrying this notification
        entry_hash: String,
        /// Notification payload
        notification: ScoreRecorded,
    },
}

impl RegistryEvent {
    /// Get event type as string for filtering and the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::ScoreRecorded { .. } => "ScoreRecorded",
        }
    }

    /// Audit sequence this event corresponds to
    pub fn sequence(&self) -> u64 {
        match self {
            RegistryEvent::ScoreRecorded { sequence, .. } => *sequence,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the write path)
/// - Multiple concurrent subscribers
/// - Lagged subscribers are detected, not waited for
///
/// The bus is the live fan-out only. The durable, ordered notification record
/// is the audit log; a subscriber that lags re-reads from there.
///
/// # Examples
///
/// ```
/// use psr_common::events::EventBus;
///
/// let event_bus = EventBus::new(1000);
/// let _rx = event_bus.subscribe();
/// assert_eq!(event_bus.subscriber_count(), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RegistryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer per subscriber before the
    ///   oldest are dropped for that subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RegistryEvent,
    ) -> Result<usize, broadcast::error::SendError<RegistryEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RegistryEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(sequence: u64) -> RegistryEvent {
        RegistryEvent::ScoreRecorded {
            sequence,
            entry_hash: "ab".repeat(32),
            notification: ScoreRecorded {
                pitch_id: PitchId::new([1; 32]),
                overall_score: 80,
                proof_reference: ProofReference::new([0xAA; 32]),
                recorded_at: Utc::now(),
                recorded_by: Identity::new("scoring-pipeline").unwrap(),
            },
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_delivers_to_all_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = sample_event(1);
        assert_eq!(bus.emit(event.clone()).expect("emit should succeed"), 2);

        assert_eq!(rx1.try_recv().expect("rx1 should receive"), event);
        assert_eq!(rx2.try_recv().expect("rx2 should receive"), event);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(sample_event(1)).is_err());
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = EventBus::new(2);
        let mut _rx = bus.subscribe();

        for i in 1..=10 {
            bus.emit_lossy(sample_event(i));
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = sample_event(7);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "ScoreRecorded");
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["notification"]["overall_score"], 80);
        assert_eq!(json["notification"]["recorded_by"], "scoring-pipeline");
        assert_eq!(
            json["notification"]["proof_reference"],
            format!("0x{}", "aa".repeat(32))
        );

        let back: RegistryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_type_and_sequence() {
        let event = sample_event(3);
        assert_eq!(event.event_type(), "ScoreRecorded");
        assert_eq!(event.sequence(), 3);
    }
}
