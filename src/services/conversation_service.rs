use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::config::get_config;
use crate::dto::conversation_dto::UpdateConversationPayload;
use crate::error::{Error, Result};
use crate::models::conversation::{Conversation, ConversationStats, LastMessage};
use crate::models::message::Contact;
use crate::models::raw_payload::RawPayload;
use crate::services::canonicalizer::{
    array_field, change_values, extract_content, named_contact, resolve_contact, wire_timestamp,
};

/// Derives conversation views from the raw payload store. Nothing here is
/// cached or incrementally maintained: every read re-scans the full store.
#[derive(Clone)]
pub struct ConversationService {
    pool: PgPool,
}

impl ConversationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_payload_bodies(&self) -> Result<Vec<JsonValue>> {
        let rows = sqlx::query_as::<_, RawPayload>("SELECT id, received_at, body FROM raw_payloads")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.body.0).collect())
    }

    pub async fn list(&self) -> Result<Vec<Conversation>> {
        let bodies = self.load_payload_bodies().await?;
        Ok(derive_conversations(&bodies, &get_config().business_wa_id))
    }

    pub async fn get(&self, wa_id: &str) -> Result<Conversation> {
        let bodies = self.load_payload_bodies().await?;
        derive_conversation(&bodies, wa_id)
            .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))
    }

    /// Conversations are views, so updates (e.g. mark-as-read) overlay the
    /// recomputed snapshot instead of mutating stored state.
    pub async fn update(
        &self,
        wa_id: &str,
        payload: UpdateConversationPayload,
    ) -> Result<Conversation> {
        let mut conversation = self.get(wa_id).await?;
        if let Some(contact) = payload.contact {
            conversation.contact = contact;
        }
        conversation.unread_count = payload.unread_count.unwrap_or(0);
        Ok(conversation)
    }

    pub async fn stats(&self) -> Result<ConversationStats> {
        let bodies = self.load_payload_bodies().await?;
        Ok(derive_stats(&bodies, &get_config().business_wa_id))
    }
}

/// Full conversation listing: one snapshot per sender, max-timestamp-wins,
/// most recent activity first. The business's own number never appears as
/// a peer.
pub fn derive_conversations(bodies: &[JsonValue], business_wa_id: &str) -> Vec<Conversation> {
    let mut snapshots: HashMap<String, Conversation> = HashMap::new();

    for body in bodies {
        for value in change_values(body) {
            for msg in array_field(value, "messages") {
                let Some(wa_id) = msg.get("from").and_then(JsonValue::as_str) else {
                    continue;
                };
                if wa_id.is_empty() || wa_id == business_wa_id {
                    continue;
                }

                let timestamp = wire_timestamp(msg);
                let newer = snapshots
                    .get(wa_id)
                    .map(|c| c.last_activity < timestamp)
                    .unwrap_or(true);
                if !newer {
                    continue;
                }

                let (_, content) = extract_content(msg);
                snapshots.insert(
                    wa_id.to_string(),
                    Conversation {
                        wa_id: wa_id.to_string(),
                        contact: resolve_contact(value.get("contacts"), wa_id),
                        last_message: Some(LastMessage {
                            id: msg
                                .get("id")
                                .and_then(JsonValue::as_str)
                                .map(String::from),
                            content,
                            timestamp,
                        }),
                        last_activity: timestamp,
                        unread_count: 0,
                    },
                );
            }
        }
    }

    let mut conversations: Vec<Conversation> = snapshots.into_values().collect();
    conversations.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    conversations
}

/// Single-conversation lookup. Unlike the listing, this counts messages
/// where the subject appears as sender or recipient, and refreshes the
/// contact profile from any payload that carries one.
pub fn derive_conversation(bodies: &[JsonValue], wa_id: &str) -> Option<Conversation> {
    let mut contact = Contact::phone_only(wa_id);
    let mut last_message: Option<LastMessage> = None;
    let mut last_activity: Option<DateTime<Utc>> = None;
    let mut found = false;

    for body in bodies {
        for value in change_values(body) {
            if let Some(named) = named_contact(value.get("contacts"), wa_id) {
                contact = named;
            }

            for msg in array_field(value, "messages") {
                let from = msg.get("from").and_then(JsonValue::as_str);
                let to = msg.get("to").and_then(JsonValue::as_str);
                if from != Some(wa_id) && to != Some(wa_id) {
                    continue;
                }
                found = true;

                let timestamp = wire_timestamp(msg);
                if last_activity.map(|cur| timestamp > cur).unwrap_or(true) {
                    last_activity = Some(timestamp);
                    let (_, content) = extract_content(msg);
                    last_message = Some(LastMessage {
                        id: msg
                            .get("id")
                            .and_then(JsonValue::as_str)
                            .map(String::from),
                        content,
                        timestamp,
                    });
                }
            }
        }
    }

    if !found {
        return None;
    }

    Some(Conversation {
        wa_id: wa_id.to_string(),
        contact,
        last_message,
        last_activity: last_activity.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        unread_count: 0,
    })
}

/// Aggregate counts across the whole store. The total message count
/// includes business-number messages; conversation counts do not.
pub fn derive_stats(bodies: &[JsonValue], business_wa_id: &str) -> ConversationStats {
    let mut total_messages: u64 = 0;
    let mut counts: HashMap<String, u64> = HashMap::new();

    for body in bodies {
        for value in change_values(body) {
            for msg in array_field(value, "messages") {
                if let Some(wa_id) = msg.get("from").and_then(JsonValue::as_str) {
                    if !wa_id.is_empty() && wa_id != business_wa_id {
                        *counts.entry(wa_id.to_string()).or_insert(0) += 1;
                    }
                }
                total_messages += 1;
            }
        }
    }

    let mut most_active_wa_id = None;
    let mut most_active_message_count = 0;
    for (wa_id, count) in &counts {
        if *count > most_active_message_count {
            most_active_wa_id = Some(wa_id.clone());
            most_active_message_count = *count;
        }
    }

    ConversationStats {
        total_conversations: counts.len(),
        total_messages,
        unread_conversations: 0,
        most_active_wa_id,
        most_active_message_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BUSINESS: &str = "918329446654";

    fn payload(messages: JsonValue) -> JsonValue {
        json!({
            "entry": [{
                "changes": [{
                    "value": { "messages": messages }
                }]
            }]
        })
    }

    fn text_msg(id: &str, from: &str, ts: &str) -> JsonValue {
        json!({
            "id": id,
            "from": from,
            "type": "text",
            "text": { "body": "hi" },
            "timestamp": ts
        })
    }

    #[test]
    fn last_activity_is_max_timestamp_regardless_of_order() {
        let newer = payload(json!([text_msg("m2", "111", "2000")]));
        let older = payload(json!([text_msg("m1", "111", "1000")]));

        let forward = derive_conversations(&[older.clone(), newer.clone()], BUSINESS);
        let backward = derive_conversations(&[newer, older], BUSINESS);

        for listing in [forward, backward] {
            assert_eq!(listing.len(), 1);
            assert_eq!(listing[0].last_activity.timestamp(), 2000);
            assert_eq!(
                listing[0].last_message.as_ref().unwrap().id.as_deref(),
                Some("m2")
            );
        }
    }

    #[test]
    fn business_number_is_never_a_peer() {
        let bodies = [payload(json!([
            text_msg("m1", BUSINESS, "1000"),
            text_msg("m2", "111", "1001")
        ]))];
        let listing = derive_conversations(&bodies, BUSINESS);
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].wa_id, "111");
    }

    #[test]
    fn malformed_payloads_contribute_nothing() {
        let bodies = [
            json!({}),
            json!({ "entry": "not-an-array" }),
            json!({ "entry": [{ "id": "no-changes" }] }),
            json!({ "entry": [{ "changes": [{ "value": {} }] }] }),
        ];
        assert!(derive_conversations(&bodies, BUSINESS).is_empty());
        assert!(derive_conversation(&bodies, "111").is_none());
        assert_eq!(derive_stats(&bodies, BUSINESS).total_messages, 0);
    }

    #[test]
    fn empty_store_lists_nothing_and_lookup_misses() {
        assert!(derive_conversations(&[], BUSINESS).is_empty());
        assert!(derive_conversation(&[], "111").is_none());
    }

    #[test]
    fn listing_is_sorted_most_recent_first() {
        let bodies = [payload(json!([
            text_msg("a", "111", "1000"),
            text_msg("b", "222", "3000"),
            text_msg("c", "333", "2000")
        ]))];
        let listing = derive_conversations(&bodies, BUSINESS);
        let order: Vec<&str> = listing.iter().map(|c| c.wa_id.as_str()).collect();
        assert_eq!(order, vec!["222", "333", "111"]);
    }

    #[test]
    fn repeated_derivation_is_identical() {
        let bodies = [
            payload(json!([text_msg("a", "111", "1000")])),
            payload(json!([text_msg("b", "222", "2000")])),
        ];
        let first = serde_json::to_string(&derive_conversations(&bodies, BUSINESS)).unwrap();
        let second = serde_json::to_string(&derive_conversations(&bodies, BUSINESS)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn lookup_sees_recipient_side_and_contact_refresh() {
        let outbound_to_peer = payload(json!([{
            "id": "m1",
            "from": BUSINESS,
            "to": "111",
            "type": "text",
            "text": { "body": "hello" },
            "timestamp": "1000"
        }]));
        let profile_update = json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "contacts": [{ "wa_id": "111", "profile": { "name": "Alice" } }],
                        "messages": []
                    }
                }]
            }]
        });

        let bodies = [outbound_to_peer, profile_update];
        let conversation = derive_conversation(&bodies, "111").expect("conversation");
        assert_eq!(conversation.contact.name.as_deref(), Some("Alice"));
        assert_eq!(conversation.last_activity.timestamp(), 1000);

        // The sender never referenced this id, so the lookup misses.
        assert!(derive_conversation(&bodies, "999").is_none());
    }

    #[test]
    fn stats_count_business_messages_in_the_total_only() {
        let bodies = [payload(json!([
            text_msg("m1", "111", "1000"),
            text_msg("m2", "111", "1001"),
            text_msg("m3", "222", "1002"),
            text_msg("m4", BUSINESS, "1003")
        ]))];
        let stats = derive_stats(&bodies, BUSINESS);
        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.most_active_wa_id.as_deref(), Some("111"));
        assert_eq!(stats.most_active_message_count, 2);
    }
}
