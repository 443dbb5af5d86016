use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::message::{Contact, MessageContent};

#[derive(Debug, Clone, Serialize)]
pub struct LastMessage {
    pub id: Option<String>,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

/// Per-peer summary view. Never stored; recomputed from raw payloads on
/// every read.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub wa_id: String,
    pub contact: Contact,
    pub last_message: Option<LastMessage>,
    pub last_activity: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total_conversations: usize,
    pub total_messages: u64,
    pub unread_conversations: u64,
    pub most_active_wa_id: Option<String>,
    pub most_active_message_count: u64,
}
