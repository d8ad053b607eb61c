//! Async channel bridge between the watcher thread and a Tokio consumer
//!
//! The drive watcher delivers events synchronously on its own OS thread.
//! Consumers that live on the Tokio runtime (the CLI watch loop, a UI
//! shell) receive them through this bounded bridge instead of blocking the
//! notification loop on async machinery.

use async_channel::{Receiver, Sender, bounded};
use records::DriveEvent;

/// Handle for the Tokio side (async)
#[derive(Clone)]
pub struct EventStream {
    event_rx: Receiver<DriveEvent>,
}

impl EventStream {
    /// Receive the next drive event from the watcher thread
    pub async fn recv(&self) -> crate::Result<DriveEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for the watcher thread (blocking)
#[derive(Clone)]
pub struct EventFeed {
    event_tx: Sender<DriveEvent>,
}

impl EventFeed {
    /// Send an event toward the Tokio runtime (blocking)
    pub fn send_blocking(&self, event: DriveEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between the watcher thread and Tokio
///
/// Returns (EventStream for Tokio, EventFeed for the watcher handler)
pub fn create_event_bridge() -> (EventStream, EventFeed) {
    let (event_tx, event_rx) = bounded(256);

    (EventStream { event_rx }, EventFeed { event_tx })
}
