use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::message::{NormalizedMessage, StatusUpdate};

/// Event pushed to every connected realtime client. Serialized as
/// `{"event": "...", "data": {...}}` text frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    NewMessage(NormalizedMessage),
    MessageStatusUpdate(StatusUpdate),
    ConversationUpdated { wa_id: String },
}

impl RealtimeEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            RealtimeEvent::NewMessage(_) => "new_message",
            RealtimeEvent::MessageStatusUpdate(_) => "message_status_update",
            RealtimeEvent::ConversationUpdated { .. } => "conversation_updated",
        }
    }
}

/// Process-wide fan-out to connected websocket clients. Fire-and-forget:
/// no persistence, no acknowledgment, no replay. A client that is not
/// connected (or lags past the channel capacity) misses those events.
#[derive(Clone)]
pub struct RealtimeService {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeService {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: RealtimeEvent) {
        // A send error only means nobody is listening right now.
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!(event = event.event_type(), "no realtime subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
