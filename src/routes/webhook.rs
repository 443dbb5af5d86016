use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use serde_json::{json, Value as JsonValue};
use subtle::ConstantTimeEq;

use crate::{
    config::get_config,
    dto::webhook_dto::VerifyParams,
    error::{Error, Result},
    AppState,
};

/// Provider verification handshake: echo `hub.challenge` when the mode is
/// `subscribe` and the token matches the configured secret.
#[axum::debug_handler]
pub async fn verify_webhook(Query(params): Query<VerifyParams>) -> Result<impl IntoResponse> {
    let (Some(mode), Some(token), Some(challenge)) =
        (params.mode, params.verify_token, params.challenge)
    else {
        return Err(Error::BadRequest("Missing hub parameters".to_string()));
    };

    if mode != "subscribe" {
        return Err(Error::Forbidden("Unsupported hub.mode".to_string()));
    }

    let expected = &get_config().webhook_verify_token;
    if ConstantTimeEq::ct_eq(token.as_bytes(), expected.as_bytes()).into() {
        Ok(challenge)
    } else {
        Err(Error::Forbidden("Verify token mismatch".to_string()))
    }
}

/// Ingests one provider delivery. The response acknowledges receipt only;
/// downstream broadcast failures are logged and swallowed.
#[axum::debug_handler]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let id = state.webhook_service.ingest(payload).await?;
    tracing::info!(payload_id = %id, "webhook payload stored");
    Ok(Json(json!({ "message": "Webhook processed successfully" })))
}
