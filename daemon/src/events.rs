//! Outward event channel towards the host.

use common::PlayerEvent;
use tokio::sync::mpsc;

/// Sending half of the outward event channel.
///
/// Emitting never blocks and never fails: with no consumer the event is
/// dropped.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the host bridge drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: PlayerEvent) {
        log::debug!("[{}] view {}", event.name(), event.view_id());
        if self.tx.send(event).is_err() {
            log::trace!("No event consumer, dropping event");
        }
    }
}
