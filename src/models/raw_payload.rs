use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// Verbatim webhook envelope as received from the provider. Append-only;
/// everything else in the data model is a view derived from these rows.
#[derive(Debug, Clone, FromRow)]
pub struct RawPayload {
    pub id: String,
    pub received_at: Option<DateTime<Utc>>,
    pub body: sqlx::types::Json<JsonValue>,
}
