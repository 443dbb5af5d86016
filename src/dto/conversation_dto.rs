use serde::Deserialize;

use crate::models::message::Contact;

#[derive(Debug, Deserialize)]
pub struct UpdateConversationPayload {
    pub contact: Option<Contact>,
    pub unread_count: Option<i64>,
}
