use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::models::message::{MessageStatus, StatusUpdate};
use crate::services::canonicalizer::{array_field, change_values, normalize_message};
use crate::services::realtime_service::{RealtimeEvent, RealtimeService};
use crate::utils::ids::generate_external_id;

/// Webhook ingress: persist the envelope verbatim, then fan out realtime
/// events for everything inside it. The provider only needs an
/// acknowledgment of receipt, so broadcast problems never reach it.
#[derive(Clone)]
pub struct WebhookService {
    pool: PgPool,
    realtime: RealtimeService,
}

impl WebhookService {
    pub fn new(pool: PgPool, realtime: RealtimeService) -> Self {
        Self { pool, realtime }
    }

    pub async fn ingest(&self, payload: JsonValue) -> Result<String> {
        if !payload
            .get("entry")
            .map(JsonValue::is_array)
            .unwrap_or(false)
        {
            return Err(Error::BadRequest("Invalid webhook payload".to_string()));
        }

        let id = generate_external_id("webhook");
        sqlx::query("INSERT INTO raw_payloads (id, body) VALUES ($1, $2)")
            .bind(&id)
            .bind(sqlx::types::Json(&payload))
            .execute(&self.pool)
            .await?;

        self.broadcast(&payload);
        Ok(id)
    }

    fn broadcast(&self, payload: &JsonValue) {
        for value in change_values(payload) {
            for msg in array_field(value, "messages") {
                let Some(from) = msg.get("from").and_then(JsonValue::as_str) else {
                    tracing::warn!("webhook message without sender, skipping broadcast");
                    continue;
                };
                let message = normalize_message(msg, value.get("contacts"), from);
                self.realtime
                    .publish(RealtimeEvent::NewMessage(message));
                self.realtime.publish(RealtimeEvent::ConversationUpdated {
                    wa_id: from.to_string(),
                });
            }

            for status in array_field(value, "statuses") {
                let Some(id) = status.get("id").and_then(JsonValue::as_str) else {
                    continue;
                };
                let mapped = status
                    .get("status")
                    .and_then(JsonValue::as_str)
                    .and_then(MessageStatus::parse)
                    .unwrap_or(MessageStatus::Sent);
                self.realtime
                    .publish(RealtimeEvent::MessageStatusUpdate(StatusUpdate {
                        id: id.to_string(),
                        status: mapped,
                    }));
            }
        }
    }
}
