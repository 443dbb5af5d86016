use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::dto::message_dto::SendMessagePayload;
use crate::error::{Error, Result};
use crate::models::message::{
    Contact, MessageContent, MessageStatus, NormalizedMessage, StatusUpdate, StoredMessage,
};
use crate::models::raw_payload::RawPayload;
use crate::services::canonicalizer::{array_field, change_values, normalize_message};
use crate::services::realtime_service::{RealtimeEvent, RealtimeService};
use crate::utils::ids::generate_external_id;

/// Assembles per-conversation timelines from the two sources of truth
/// (outbound rows and raw payloads) and owns the outbound message
/// lifecycle.
#[derive(Clone)]
pub struct MessageService {
    pool: PgPool,
    realtime: RealtimeService,
}

impl MessageService {
    pub fn new(pool: PgPool, realtime: RealtimeService) -> Self {
        Self { pool, realtime }
    }

    async fn load_payload_bodies(&self) -> Result<Vec<JsonValue>> {
        let rows = sqlx::query_as::<_, RawPayload>("SELECT id, received_at, body FROM raw_payloads")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.body.0).collect())
    }

    /// Complete, time-ordered history for one peer. Full re-sort on every
    /// request; no pagination.
    pub async fn timeline(&self, wa_id: &str) -> Result<Vec<NormalizedMessage>> {
        let outbound = sqlx::query_as::<_, StoredMessage>(
            r#"
            SELECT id, external_id, wa_id, msg_type, content, direction, status, timestamp, contact, created_at
            FROM messages
            WHERE wa_id = $1 AND direction = 'outbound'
            "#,
        )
        .bind(wa_id)
        .fetch_all(&self.pool)
        .await?;

        let bodies = self.load_payload_bodies().await?;
        let outbound = outbound
            .into_iter()
            .map(StoredMessage::into_normalized)
            .collect();
        Ok(assemble_timeline(outbound, &bodies, wa_id))
    }

    /// Stores an outbound text message. Demo semantics: the message is
    /// persisted and broadcast, not delivered to the real network.
    pub async fn send(&self, payload: SendMessagePayload) -> Result<NormalizedMessage> {
        let external_id = generate_external_id("local");
        let contact = Contact::phone_only(&payload.wa_id);
        let content = MessageContent::text(payload.content);

        let row = sqlx::query_as::<_, StoredMessage>(
            r#"
            INSERT INTO messages (external_id, wa_id, msg_type, content, direction, status, timestamp, contact)
            VALUES ($1, $2, 'text', $3, 'outbound', 'sent', $4, $5)
            RETURNING id, external_id, wa_id, msg_type, content, direction, status, timestamp, contact, created_at
            "#,
        )
        .bind(&external_id)
        .bind(&payload.wa_id)
        .bind(sqlx::types::Json(content.to_value()))
        .bind(Utc::now())
        .bind(sqlx::types::Json(serde_json::to_value(&contact)?))
        .fetch_one(&self.pool)
        .await?;

        let message = row.into_normalized();
        self.realtime
            .publish(RealtimeEvent::NewMessage(message.clone()));
        Ok(message)
    }

    /// Applies a delivery-status update. Outbound rows are persisted under
    /// the monotonic lattice; inbound messages are views, so a matching
    /// raw-payload message only produces a broadcast.
    pub async fn update_status(&self, id: &str, raw_status: &str) -> Result<StatusUpdate> {
        let Some(next) = MessageStatus::parse(raw_status) else {
            return Err(Error::BadRequest("Valid status is required".to_string()));
        };

        let existing = sqlx::query_as::<_, StoredMessage>(
            r#"
            SELECT id, external_id, wa_id, msg_type, content, direction, status, timestamp, contact, created_at
            FROM messages
            WHERE external_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            let current = MessageStatus::parse(&row.status).unwrap_or(MessageStatus::Sent);
            if !current.can_transition(next) {
                return Err(Error::BadRequest(format!(
                    "Invalid status transition: {} -> {}",
                    current.as_str(),
                    next.as_str()
                )));
            }
            if current != next {
                sqlx::query("UPDATE messages SET status = $1 WHERE external_id = $2")
                    .bind(next.as_str())
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            let update = StatusUpdate {
                id: id.to_string(),
                status: next,
            };
            self.realtime
                .publish(RealtimeEvent::MessageStatusUpdate(update.clone()));
            return Ok(update);
        }

        let bodies = self.load_payload_bodies().await?;
        if !bodies.iter().any(|body| payload_contains_message(body, id)) {
            return Err(Error::NotFound("Message not found".to_string()));
        }

        let update = StatusUpdate {
            id: id.to_string(),
            status: next,
        };
        self.realtime
            .publish(RealtimeEvent::MessageStatusUpdate(update.clone()));
        Ok(update)
    }

    /// Deletes one message by external id. When the target lives inside a
    /// raw payload the whole payload is removed; that is the out-of-band
    /// administrative semantics of deletion against an append-only store.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM messages WHERE external_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let payloads =
            sqlx::query_as::<_, RawPayload>("SELECT id, received_at, body FROM raw_payloads")
                .fetch_all(&self.pool)
                .await?;
        for payload in payloads {
            if payload_contains_message(&payload.body.0, id) {
                sqlx::query("DELETE FROM raw_payloads WHERE id = $1")
                    .bind(&payload.id)
                    .execute(&self.pool)
                    .await?;
                return Ok(());
            }
        }

        Err(Error::NotFound("Message not found".to_string()))
    }
}

/// Inbound and outbound halves concatenated and fully re-sorted ascending
/// by timestamp.
pub fn assemble_timeline(
    outbound: Vec<NormalizedMessage>,
    bodies: &[JsonValue],
    wa_id: &str,
) -> Vec<NormalizedMessage> {
    let mut all = outbound;
    all.extend(extract_inbound_timeline(bodies, wa_id));
    all.sort_by_key(|m| m.timestamp);
    all
}

/// Every raw-payload message where the subject appears as sender or
/// recipient, canonicalized against that subject.
pub fn extract_inbound_timeline(bodies: &[JsonValue], wa_id: &str) -> Vec<NormalizedMessage> {
    let mut messages = Vec::new();
    for body in bodies {
        for value in change_values(body) {
            for msg in array_field(value, "messages") {
                let from = msg.get("from").and_then(JsonValue::as_str);
                let to = msg.get("to").and_then(JsonValue::as_str);
                if from != Some(wa_id) && to != Some(wa_id) {
                    continue;
                }
                messages.push(normalize_message(msg, value.get("contacts"), wa_id));
            }
        }
    }
    messages
}

/// Whether any message in the envelope carries the given external id.
pub fn payload_contains_message(body: &JsonValue, id: &str) -> bool {
    change_values(body).into_iter().any(|value| {
        array_field(value, "messages")
            .iter()
            .any(|msg| msg.get("id").and_then(JsonValue::as_str) == Some(id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{Direction, MessageType};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn outbound_msg(id: &str, wa_id: &str, secs: i64) -> NormalizedMessage {
        NormalizedMessage {
            id: id.to_string(),
            wa_id: wa_id.to_string(),
            r#type: MessageType::Text,
            content: MessageContent::text("out"),
            status: MessageStatus::Sent,
            direction: Direction::Outbound,
            timestamp: Utc.timestamp_opt(secs, 0).single().unwrap(),
            contact: Contact::phone_only(wa_id),
        }
    }

    fn inbound_payload(id: &str, from: &str, secs: i64) -> JsonValue {
        json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "id": id,
                            "from": from,
                            "type": "text",
                            "text": { "body": "in" },
                            "timestamp": secs.to_string()
                        }]
                    }
                }]
            }]
        })
    }

    #[test]
    fn timeline_interleaves_both_sources_in_ascending_order() {
        let outbound = vec![
            outbound_msg("o1", "111", 1),
            outbound_msg("o2", "111", 3),
            outbound_msg("o3", "111", 5),
        ];
        let bodies = [
            inbound_payload("i1", "111", 2),
            inbound_payload("i2", "111", 4),
        ];

        let timeline = assemble_timeline(outbound, &bodies, "111");
        assert_eq!(timeline.len(), 5);
        let ids: Vec<&str> = timeline.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "i1", "o2", "i2", "o3"]);
        let stamps: Vec<i64> = timeline.iter().map(|m| m.timestamp.timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn timeline_only_sees_the_subject_conversation() {
        let bodies = [
            inbound_payload("i1", "111", 1),
            inbound_payload("i2", "222", 2),
        ];
        let timeline = assemble_timeline(Vec::new(), &bodies, "111");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].id, "i1");
        assert_eq!(timeline[0].direction, Direction::Inbound);
        assert_eq!(timeline[0].status, MessageStatus::Received);
    }

    #[test]
    fn unparsable_inbound_timestamps_sort_to_the_front() {
        let broken = json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "id": "b1",
                            "from": "111",
                            "type": "text",
                            "text": { "body": "?" },
                            "timestamp": "garbage"
                        }]
                    }
                }]
            }]
        });
        let timeline = assemble_timeline(vec![outbound_msg("o1", "111", 10)], &[broken], "111");
        assert_eq!(timeline[0].id, "b1");
        assert_eq!(timeline[0].timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn payload_scan_finds_message_ids() {
        let body = inbound_payload("wamid.123", "111", 1);
        assert!(payload_contains_message(&body, "wamid.123"));
        assert!(!payload_contains_message(&body, "wamid.999"));
        assert!(!payload_contains_message(&json!({}), "wamid.123"));
    }
}
