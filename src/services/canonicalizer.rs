//! Pure mapping from the provider wire format to [`NormalizedMessage`],
//! plus the permissive walk over the nested webhook envelope shared by
//! the aggregation, timeline and ingress paths.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

use crate::models::message::{
    Contact, Direction, MessageContent, MessageStatus, MessageType, NormalizedMessage,
};

/// Yields every `change.value` object in a webhook envelope. Any level
/// that is missing or not the expected shape skips that branch instead
/// of failing: partially-shaped payloads contribute nothing.
pub fn change_values(body: &JsonValue) -> Vec<&JsonValue> {
    let mut values = Vec::new();
    let Some(entries) = body.get("entry").and_then(JsonValue::as_array) else {
        return values;
    };
    for entry in entries {
        let Some(changes) = entry.get("changes").and_then(JsonValue::as_array) else {
            continue;
        };
        for change in changes {
            if let Some(value) = change.get("value") {
                if value.is_object() {
                    values.push(value);
                }
            }
        }
    }
    values
}

/// Returns `value[key]` as a slice, or an empty slice when the field is
/// absent or not an array.
pub fn array_field<'a>(value: &'a JsonValue, key: &str) -> &'a [JsonValue] {
    value
        .get(key)
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parses a wire timestamp (string of whole seconds since epoch). Anything
/// unparsable degrades to the epoch rather than an error.
pub fn parse_wire_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| secs.checked_mul(1000))
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Timestamp of one raw message object; accepts both the documented
/// string form and a bare number.
pub fn wire_timestamp(msg: &JsonValue) -> DateTime<Utc> {
    match msg.get("timestamp") {
        Some(JsonValue::String(s)) => parse_wire_timestamp(Some(s)),
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .and_then(|secs| secs.checked_mul(1000))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        _ => DateTime::<Utc>::UNIX_EPOCH,
    }
}

fn nested_str(msg: &JsonValue, outer: &str, inner: &str) -> Option<String> {
    msg.get(outer)
        .and_then(|v| v.get(inner))
        .and_then(JsonValue::as_str)
        .map(String::from)
}

fn nested_f64(msg: &JsonValue, outer: &str, inner: &str) -> Option<f64> {
    msg.get(outer)
        .and_then(|v| v.get(inner))
        .and_then(JsonValue::as_f64)
}

/// Extracts the type-specific content subset from one raw message object.
/// Unmodeled types keep the whole object under `raw` and must not fail.
pub fn extract_content(msg: &JsonValue) -> (MessageType, MessageContent) {
    let msg_type = MessageType::from_wire(msg.get("type").and_then(JsonValue::as_str));
    let content = match msg_type {
        MessageType::Text => MessageContent::Text {
            text: nested_str(msg, "text", "body"),
        },
        MessageType::Image => MessageContent::Media {
            caption: nested_str(msg, "image", "caption"),
            url: nested_str(msg, "image", "url"),
        },
        MessageType::Audio => MessageContent::Audio {
            url: nested_str(msg, "audio", "url"),
        },
        MessageType::Video => MessageContent::Media {
            caption: nested_str(msg, "video", "caption"),
            url: nested_str(msg, "video", "url"),
        },
        MessageType::Document => MessageContent::Document {
            filename: nested_str(msg, "document", "filename"),
            url: nested_str(msg, "document", "url"),
        },
        MessageType::Location => MessageContent::Location {
            latitude: nested_f64(msg, "location", "latitude"),
            longitude: nested_f64(msg, "location", "longitude"),
            name: nested_str(msg, "location", "name"),
            address: nested_str(msg, "location", "address"),
        },
        MessageType::Unknown => MessageContent::Unknown { raw: msg.clone() },
    };
    (msg_type, content)
}

/// Finds the contact entry for `wa_id` carrying a profile name, if any.
pub fn named_contact(contacts: Option<&JsonValue>, wa_id: &str) -> Option<Contact> {
    let list = contacts.and_then(JsonValue::as_array)?;
    for c in list {
        if c.get("wa_id").and_then(JsonValue::as_str) != Some(wa_id) {
            continue;
        }
        if let Some(name) = c
            .get("profile")
            .and_then(|p| p.get("name"))
            .and_then(JsonValue::as_str)
        {
            return Some(Contact {
                name: Some(name.to_string()),
                phone: wa_id.to_string(),
            });
        }
    }
    None
}

/// Contact for `wa_id`, falling back to a bare phone entry when the
/// payload carries no matching profile.
pub fn resolve_contact(contacts: Option<&JsonValue>, wa_id: &str) -> Contact {
    named_contact(contacts, wa_id).unwrap_or_else(|| Contact::phone_only(wa_id))
}

/// Canonicalizes one raw message object against the conversation subject
/// under examination. Sender-equals-subject means inbound.
pub fn normalize_message(
    msg: &JsonValue,
    contacts: Option<&JsonValue>,
    subject_wa_id: &str,
) -> NormalizedMessage {
    let (msg_type, content) = extract_content(msg);
    let from = msg.get("from").and_then(JsonValue::as_str).unwrap_or("");
    let direction = if from == subject_wa_id {
        Direction::Inbound
    } else {
        Direction::Outbound
    };
    let status = match direction {
        Direction::Inbound => MessageStatus::Received,
        Direction::Outbound => MessageStatus::Sent,
    };

    NormalizedMessage {
        id: msg
            .get("id")
            .and_then(JsonValue::as_str)
            .unwrap_or("")
            .to_string(),
        wa_id: subject_wa_id.to_string(),
        r#type: msg_type,
        content,
        status,
        direction,
        timestamp: wire_timestamp(msg),
        contact: resolve_contact(contacts, subject_wa_id),
    }
}
