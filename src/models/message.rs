use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Location,
    Unknown,
}

impl MessageType {
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("text") => MessageType::Text,
            Some("image") => MessageType::Image,
            Some("audio") => MessageType::Audio,
            Some("video") => MessageType::Video,
            Some("document") => MessageType::Document,
            Some("location") => MessageType::Location,
            _ => MessageType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Audio => "audio",
            MessageType::Video => "video",
            MessageType::Document => "document",
            MessageType::Location => "location",
            MessageType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "inbound" => Some(Direction::Inbound),
            "outbound" => Some(Direction::Outbound),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
    Received,
}

impl MessageStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            "failed" => Some(MessageStatus::Failed),
            "received" => Some(MessageStatus::Received),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
            MessageStatus::Received => "received",
        }
    }

    fn rank(self) -> u8 {
        match self {
            MessageStatus::Received => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 4,
        }
    }

    /// `read` and `failed` are terminal in the delivery lattice.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Read | MessageStatus::Failed)
    }

    /// Whether a status update from `self` to `next` is allowed.
    /// Same-status updates are idempotent no-ops; `failed` is reachable
    /// from any non-terminal state; regressions are rejected.
    pub fn can_transition(self, next: MessageStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if next == MessageStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub phone: String,
}

impl Contact {
    pub fn phone_only(wa_id: &str) -> Self {
        Self {
            name: None,
            phone: wa_id.to_string(),
        }
    }
}

/// Type-specific message body. Unknown wire types keep the original
/// object verbatim so no data is lost.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text {
        text: Option<String>,
    },
    Media {
        caption: Option<String>,
        url: Option<String>,
    },
    Audio {
        url: Option<String>,
    },
    Document {
        filename: Option<String>,
        url: Option<String>,
    },
    Location {
        latitude: Option<f64>,
        longitude: Option<f64>,
        name: Option<String>,
        address: Option<String>,
    },
    Unknown {
        raw: JsonValue,
    },
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        MessageContent::Text {
            text: Some(body.into()),
        }
    }

    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    /// Rehydrates stored JSONB content. The untagged representation is
    /// ambiguous on its own, so the stored message type picks the variant.
    pub fn from_stored(msg_type: MessageType, value: JsonValue) -> Self {
        fn string_field(value: &JsonValue, key: &str) -> Option<String> {
            value.get(key).and_then(JsonValue::as_str).map(String::from)
        }

        match msg_type {
            MessageType::Text => MessageContent::Text {
                text: string_field(&value, "text"),
            },
            MessageType::Image | MessageType::Video => MessageContent::Media {
                caption: string_field(&value, "caption"),
                url: string_field(&value, "url"),
            },
            MessageType::Audio => MessageContent::Audio {
                url: string_field(&value, "url"),
            },
            MessageType::Document => MessageContent::Document {
                filename: string_field(&value, "filename"),
                url: string_field(&value, "url"),
            },
            MessageType::Location => MessageContent::Location {
                latitude: value.get("latitude").and_then(JsonValue::as_f64),
                longitude: value.get("longitude").and_then(JsonValue::as_f64),
                name: string_field(&value, "name"),
                address: string_field(&value, "address"),
            },
            MessageType::Unknown => {
                let raw = value.get("raw").cloned().unwrap_or(value);
                MessageContent::Unknown { raw }
            }
        }
    }
}

/// Canonical view of one message, whether derived from a webhook payload
/// or originated locally.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedMessage {
    pub id: String,
    pub wa_id: String,
    pub r#type: MessageType,
    pub content: MessageContent,
    pub status: MessageStatus,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub contact: Contact,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub id: String,
    pub status: MessageStatus,
}

/// Row in the `messages` table (locally originated messages only; the
/// inbound half of the data model is always recomputed from raw payloads).
#[derive(Debug, Clone, FromRow)]
pub struct StoredMessage {
    pub id: Uuid,
    pub external_id: String,
    pub wa_id: String,
    pub msg_type: String,
    pub content: sqlx::types::Json<JsonValue>,
    pub direction: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub contact: sqlx::types::Json<JsonValue>,
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredMessage {
    pub fn into_normalized(self) -> NormalizedMessage {
        let msg_type = MessageType::from_wire(Some(&self.msg_type));
        let contact = serde_json::from_value(self.contact.0)
            .unwrap_or_else(|_| Contact::phone_only(&self.wa_id));
        NormalizedMessage {
            id: self.external_id,
            wa_id: self.wa_id,
            r#type: msg_type,
            content: MessageContent::from_stored(msg_type, self.content.0),
            status: MessageStatus::parse(&self.status).unwrap_or(MessageStatus::Sent),
            direction: Direction::parse(&self.direction).unwrap_or(Direction::Outbound),
            timestamp: self.timestamp,
            contact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lattice_is_monotonic() {
        use MessageStatus::*;

        assert!(Sent.can_transition(Delivered));
        assert!(Sent.can_transition(Read));
        assert!(Delivered.can_transition(Read));
        assert!(Sent.can_transition(Failed));
        assert!(Delivered.can_transition(Failed));

        // Regressions are rejected.
        assert!(!Read.can_transition(Sent));
        assert!(!Read.can_transition(Delivered));
        assert!(!Delivered.can_transition(Sent));

        // No transitions out of terminal states.
        assert!(!Read.can_transition(Failed));
        assert!(!Failed.can_transition(Sent));
        assert!(!Failed.can_transition(Read));

        // Same-status updates are idempotent.
        assert!(Read.can_transition(Read));
        assert!(Sent.can_transition(Sent));
    }

    #[test]
    fn stored_content_round_trips_through_type_column() {
        let content = MessageContent::Location {
            latitude: Some(19.0760),
            longitude: Some(72.8777),
            name: Some("Mumbai".to_string()),
            address: None,
        };
        let restored = MessageContent::from_stored(MessageType::Location, content.to_value());
        assert_eq!(restored, content);

        let text = MessageContent::text("hello");
        let restored = MessageContent::from_stored(MessageType::Text, text.to_value());
        assert_eq!(restored, text);
    }
}
