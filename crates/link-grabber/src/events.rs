//! Collection lifecycle events.
//!
//! The [`EventBus`] is a `tokio::sync::broadcast` channel carrying
//! [`GrabEvent`] values. Presentation layers subscribe to learn when a tab's
//! result is ready; when nobody is subscribed, events are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{FinalizeReason, TabId};

/// Every event the aggregator emits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GrabEvent {
    /// A collection was armed for a tab.
    CollectionStarted {
        tab_id: TabId,
        source_url: String,
        expected_frames: usize,
    },
    /// A pending collection was replaced by a newer trigger.
    CollectionSuperseded { tab_id: TabId, dropped_links: usize },
    /// A frame's links were accepted.
    FrameReported {
        tab_id: TabId,
        frame_url: String,
        link_count: usize,
        received: usize,
        expected: usize,
    },
    /// A report arrived for a collection that no longer exists.
    LateReportDiscarded {
        tab_id: TabId,
        frame_url: String,
        link_count: usize,
    },
    /// The collection result was published.
    CollectionFinalized {
        tab_id: TabId,
        reason: FinalizeReason,
        link_count: usize,
        frames_received: usize,
        frames_expected: usize,
    },
    /// The tab went away; pending state and result were dropped.
    CollectionAborted { tab_id: TabId },
}

impl GrabEvent {
    pub fn tab_id(&self) -> TabId {
        match self {
            GrabEvent::CollectionStarted { tab_id, .. }
            | GrabEvent::CollectionSuperseded { tab_id, .. }
            | GrabEvent::FrameReported { tab_id, .. }
            | GrabEvent::LateReportDiscarded { tab_id, .. }
            | GrabEvent::CollectionFinalized { tab_id, .. }
            | GrabEvent::CollectionAborted { tab_id } => *tab_id,
        }
    }
}

/// Broadcast channel for [`GrabEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GrabEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: GrabEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<GrabEvent> {
        self.sender.subscribe()
    }
}
