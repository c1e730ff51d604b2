//! Event types for VPW event system
//!
//! Provides shared event definitions and EventBus for all VPW components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::key::PlateKey;
use crate::model::CheckStatus;

/// How a refresh run finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every selected plate was checked successfully
    Completed,
    /// At least one check failed and was recorded as `Error`
    CompletedWithErrors,
}

/// VPW event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so a UI
/// caller can consume them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlateEvent {
    /// A plate was added or updated through upsert
    PlateSaved {
        key: PlateKey,
        timestamp: DateTime<Utc>,
    },

    /// A plate was removed by key
    PlateDeleted {
        key: PlateKey,
        timestamp: DateTime<Utc>,
    },

    /// A refresh run selected its targets and is about to check them
    RefreshStarted {
        total: usize,
        forced: bool,
        timestamp: DateTime<Utc>,
    },

    /// One plate finished checking and the store was persisted
    RefreshProgress {
        completed: usize,
        total: usize,
        plate_text: String,
        status: CheckStatus,
        timestamp: DateTime<Utc>,
    },

    /// A refresh run finished
    RefreshCompleted {
        total: usize,
        failed: usize,
        outcome: RunOutcome,
        timestamp: DateTime<Utc>,
    },
}

impl PlateEvent {
    /// Variant name, matching the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PlateEvent::PlateSaved { .. } => "PlateSaved",
            PlateEvent::PlateDeleted { .. } => "PlateDeleted",
            PlateEvent::RefreshStarted { .. } => "RefreshStarted",
            PlateEvent::RefreshProgress { .. } => "RefreshProgress",
            PlateEvent::RefreshCompleted { .. } => "RefreshCompleted",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lose the
/// oldest events once the channel capacity is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlateEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlateEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlateEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
