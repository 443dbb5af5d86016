use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use validator::Validate;

use crate::{
    dto::message_dto::{SendMessagePayload, UpdateStatusPayload},
    error::Result,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/messages/conversation/{wa_id}",
    params(
        ("wa_id" = String, Path, description = "Conversation peer id")
    ),
    responses(
        (status = 200, description = "Full message timeline, ascending by timestamp", body = Json<serde_json::Value>)
    )
)]
#[axum::debug_handler]
pub async fn get_conversation_messages(
    State(state): State<AppState>,
    Path(wa_id): Path<String>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.timeline(&wa_id).await?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/api/messages/send",
    request_body = SendMessagePayload,
    responses(
        (status = 201, description = "Outbound message stored", body = Json<serde_json::Value>),
        (status = 400, description = "Missing wa_id or content")
    )
)]
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let message = state.message_service.send(payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    patch,
    path = "/api/messages/status/{id}",
    params(
        ("id" = String, Path, description = "External message id")
    ),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status update applied", body = Json<serde_json::Value>),
        (status = 400, description = "Unknown status or rejected regression"),
        (status = 404, description = "Message not found")
    )
)]
#[axum::debug_handler]
pub async fn update_message_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    let update = state
        .message_service
        .update_status(&id, &payload.status)
        .await?;
    Ok(Json(update))
}

#[utoipa::path(
    delete,
    path = "/api/messages/{id}",
    params(
        ("id" = String, Path, description = "External message id")
    ),
    responses(
        (status = 200, description = "Message deleted"),
        (status = 404, description = "Message not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.message_service.delete(&id).await?;
    Ok(Json(json!({ "message": "Message deleted successfully" })))
}
