//! Event types emitted by the editor and the import job client.
//!
//! Events are what a front end turns into alerts, progress labels and
//! "scroll into view" hints. They are delivered through a [`Notifier`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{ExitId, GameId, JobId, LocationId};

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event emitted by a Quill component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorEvent {
    pub id: EventId,
    pub game_id: Option<GameId>,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl EditorEvent {
    pub fn new(game_id: Option<GameId>, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            game_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    // ── Graph events ──────────────────────────────────────────
    /// The graph was (re)loaded and reconciled.
    GraphLoaded {
        locations: usize,
        exits: usize,
        source: String,
    },
    LocationAdded {
        location_id: LocationId,
    },
    LocationUpdated {
        location_id: LocationId,
    },
    LocationDeleted {
        location_id: LocationId,
    },
    /// A location changed position; front ends scroll it into view.
    LocationMoved {
        location_id: LocationId,
        writes: usize,
    },
    ExitCreated {
        exit_id: ExitId,
        location_id: LocationId,
    },
    ExitUpdated {
        exit_id: ExitId,
    },
    ExitDeleted {
        exit_id: ExitId,
    },
    GameUpdated {
        fields: Vec<String>,
    },
    /// A write was rejected; shown as a blocking alert.
    WriteFailed {
        operation: String,
        message: String,
    },
    /// A write was saved but the reload after it failed; the view is out of date.
    ViewStale {
        operation: String,
        message: String,
    },

    // ── Import events ─────────────────────────────────────────
    ImportStarted {
        job_id: JobId,
    },
    /// The job reported a new progress label.
    ImportProgress {
        job_id: JobId,
        attempt: u32,
        label: String,
    },
    ImportFinished {
        job_id: Option<JobId>,
        outcome: String,
        message: String,
    },
}

/// Delivers events to whoever listens. A disabled notifier drops everything.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<EditorEvent>>,
}

impl Notifier {
    /// A notifier connected to a fresh receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EditorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, game_id: Option<&GameId>, payload: EventPayload) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = EditorEvent::new(game_id.cloned(), payload);
        if tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = EditorEvent::new(
            Some(GameId::new("g1")),
            EventPayload::ExitCreated {
                exit_id: ExitId::new("e1"),
                location_id: LocationId::new("l1"),
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: EditorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, deserialized.id);
        assert_eq!(event.payload, deserialized.payload);
    }

    #[test]
    fn test_event_payload_tags() {
        let payload = EventPayload::WriteFailed {
            operation: "delete_exit".to_string(),
            message: "HTTP 500".to_string(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"event_type\":\"WriteFailed\""));
    }

    #[tokio::test]
    async fn test_notifier_delivers_and_disabled_drops() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.emit(
            Some(&GameId::new("g1")),
            EventPayload::ExitDeleted {
                exit_id: ExitId::new("e1"),
            },
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(event.game_id, Some(GameId::new("g1")));

        Notifier::disabled().emit(
            None,
            EventPayload::ExitDeleted {
                exit_id: ExitId::new("e2"),
            },
        );
    }
}
