//! In-process change notifier backed by a `tokio::sync::broadcast` channel.
//!
//! [`ChangeNotifier`] tells connected viewers that proposal state changed so
//! they can re-fetch. Delivery is fire-and-forget and at-most-once per
//! listener; nothing is persisted or replayed, so a listener that connects
//! late has to read current state itself.

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// A change worth refreshing for. Serializes as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ChangeEvent {
    /// Sent once to each new stream before any real event.
    #[serde(rename = "hello")]
    Hello {},
    #[serde(rename = "proposal.created")]
    ProposalCreated { id: i32 },
    /// Vote cast or retracted, promotion, admin edit.
    #[serde(rename = "proposal.updated")]
    ProposalUpdated { id: i32 },
    #[serde(rename = "proposal.deleted")]
    ProposalDeleted { id: i32 },
    #[serde(rename = "setlist_reordered")]
    SetlistReordered { ids: Vec<i32> },
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Hello {} => "hello",
            ChangeEvent::ProposalCreated { .. } => "proposal.created",
            ChangeEvent::ProposalUpdated { .. } => "proposal.updated",
            ChangeEvent::ProposalDeleted { .. } => "proposal.deleted",
            ChangeEvent::SetlistReordered { .. } => "setlist_reordered",
        }
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Publish/subscribe broker owned by the application state.
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Create a notifier with a specific channel capacity.
    ///
    /// A listener that falls more than `capacity` events behind skips the
    /// oldest ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every current listener. Returns how many were reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::debug!(kind = event.kind(), "Publishing change event");
        // A send error only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Register a listener. Dropping the subscription unregisters it.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A registered listener.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Wait for the next event, skipping over any the listener lagged past.
    /// Returns `None` once the notifier is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}

    pub fn into_stream(self) -> BroadcastStream<ChangeEvent> {
        BroadcastStream::new(self.receiver)
    }
}
