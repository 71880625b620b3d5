//! Change notifications for UI and other observers.

use seel_core::ContentId;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEvent {
    /// A new snapshot was published and the pointer advanced.
    Published {
        /// `None` for the initial snapshot created at registration
        previous: Option<ContentId>,
        current: ContentId,
        /// Publish attempts it took, 1 when the pointer did not move
        attempts: u32,
    },
    /// A key pair became active (load, register or sync import).
    SessionChanged { user_id: String },
    /// The device was logged out or its local state was discarded.
    SessionCleared,
}

/// Cloneable sender side shared by the manifest store and the session.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ManifestEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManifestEvent> {
        self.tx.subscribe()
    }

    /// Delivery is best effort: with no subscribers the event is dropped.
    pub fn emit(&self, event: ManifestEvent) {
        tracing::trace!(?event, "manifest event");
        let _ = self.tx.send(event);
    }
}
