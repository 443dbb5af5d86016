use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value as JsonValue};
use whatsapp_backend::models::message::{
    Contact, Direction, MessageContent, MessageStatus, MessageType, NormalizedMessage,
};
use whatsapp_backend::services::canonicalizer::{change_values, normalize_message};
use whatsapp_backend::services::conversation_service::{
    derive_conversation, derive_conversations, derive_stats,
};
use whatsapp_backend::services::message_service::{
    assemble_timeline, extract_inbound_timeline, payload_contains_message,
};

const BUSINESS: &str = "918329446654";

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn inbound_payload(wa_id: &str, name: &str, msg_id: &str, text: &str, secs: i64) -> JsonValue {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "value": {
                    "contacts": [{ "wa_id": wa_id, "profile": { "name": name } }],
                    "messages": [{
                        "id": msg_id,
                        "from": wa_id,
                        "type": "text",
                        "text": { "body": text },
                        "timestamp": secs.to_string(),
                    }]
                }
            }]
        }]
    })
}

fn outbound_message(wa_id: &str, id: &str, text: &str, secs: i64) -> NormalizedMessage {
    NormalizedMessage {
        id: id.to_string(),
        wa_id: wa_id.to_string(),
        r#type: MessageType::Text,
        content: MessageContent::text(text),
        status: MessageStatus::Sent,
        direction: Direction::Outbound,
        timestamp: ts(secs),
        contact: Contact::phone_only(wa_id),
    }
}

#[test]
fn webhook_bodies_flow_into_conversations_and_timelines() {
    let bodies = vec![
        inbound_payload("15551230001", "Alice", "wamid.a1", "hello", 100),
        inbound_payload("15551230002", "Bob", "wamid.b1", "hey there", 200),
        inbound_payload("15551230001", "Alice", "wamid.a2", "are you there?", 300),
    ];

    let conversations = derive_conversations(&bodies, BUSINESS);
    assert_eq!(conversations.len(), 2);

    // Most recent activity first.
    assert_eq!(conversations[0].wa_id, "15551230001");
    assert_eq!(conversations[0].last_activity, ts(300));
    assert_eq!(
        conversations[0].last_message.as_ref().unwrap().id.as_deref(),
        Some("wamid.a2")
    );
    assert_eq!(conversations[1].wa_id, "15551230002");

    let alice = derive_conversation(&bodies, "15551230001").expect("conversation");
    assert_eq!(alice.contact.name.as_deref(), Some("Alice"));
    assert_eq!(alice.contact.phone, "15551230001");

    let inbound = extract_inbound_timeline(&bodies, "15551230001");
    assert_eq!(inbound.len(), 2);

    let outbound = vec![outbound_message("15551230001", "api_1_x", "hi Alice", 250)];
    let timeline = assemble_timeline(outbound, &bodies, "15551230001");
    let ids: Vec<&str> = timeline.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["wamid.a1", "api_1_x", "wamid.a2"]);

    let stats = derive_stats(&bodies, BUSINESS);
    assert_eq!(stats.total_conversations, 2);
    assert_eq!(stats.total_messages, 3);
    assert_eq!(stats.most_active_wa_id.as_deref(), Some("15551230001"));
    assert_eq!(stats.most_active_message_count, 2);
}

#[test]
fn business_own_messages_never_open_conversations() {
    let bodies = vec![
        inbound_payload(BUSINESS, "Business", "wamid.biz", "echo", 50),
        inbound_payload("15551230009", "Carol", "wamid.c1", "hi", 60),
    ];

    let conversations = derive_conversations(&bodies, BUSINESS);
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].wa_id, "15551230009");
}

#[test]
fn normalization_matches_stored_wire_shape() {
    let body = inbound_payload("15551230001", "Alice", "wamid.a1", "hello", 100);
    let values = change_values(&body);
    assert_eq!(values.len(), 1);

    let msg = &values[0]["messages"][0];
    let normalized = normalize_message(msg, Some(&values[0]["contacts"]), "15551230001");
    assert_eq!(normalized.id, "wamid.a1");
    assert_eq!(normalized.direction, Direction::Inbound);
    assert_eq!(normalized.status, MessageStatus::Received);
    assert_eq!(normalized.timestamp, ts(100));
    assert_eq!(
        serde_json::to_value(&normalized.content).unwrap(),
        json!({ "text": "hello" })
    );
}

#[test]
fn payload_scan_matches_message_ids_only() {
    let body = inbound_payload("15551230001", "Alice", "wamid.a1", "hello", 100);
    assert!(payload_contains_message(&body, "wamid.a1"));
    assert!(!payload_contains_message(&body, "wamid.other"));

    let status_body = json!({
        "entry": [{
            "changes": [{
                "value": {
                    "statuses": [{ "id": "wamid.s1", "status": "delivered" }]
                }
            }]
        }]
    });
    assert!(!payload_contains_message(&status_body, "wamid.s1"));
}
