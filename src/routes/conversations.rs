use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};

use crate::{dto::conversation_dto::UpdateConversationPayload, error::Result, AppState};

#[utoipa::path(
    get,
    path = "/api/conversations",
    responses(
        (status = 200, description = "All conversations, most recent activity first", body = Json<serde_json::Value>)
    )
)]
#[axum::debug_handler]
pub async fn list_conversations(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let conversations = state.conversation_service.list().await?;
    Ok(Json(conversations))
}

#[utoipa::path(
    get,
    path = "/api/conversations/stats",
    responses(
        (status = 200, description = "Aggregate conversation counts", body = Json<serde_json::Value>)
    )
)]
#[axum::debug_handler]
pub async fn get_conversation_stats(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.conversation_service.stats().await?;
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{wa_id}",
    params(
        ("wa_id" = String, Path, description = "Conversation peer id")
    ),
    responses(
        (status = 200, description = "Conversation found", body = Json<serde_json::Value>),
        (status = 404, description = "No stored message references this peer")
    )
)]
#[axum::debug_handler]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(wa_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conversation = state.conversation_service.get(&wa_id).await?;
    Ok(Json(conversation))
}

#[utoipa::path(
    patch,
    path = "/api/conversations/{wa_id}",
    params(
        ("wa_id" = String, Path, description = "Conversation peer id")
    ),
    request_body = UpdateConversationPayload,
    responses(
        (status = 200, description = "Updated conversation view", body = Json<serde_json::Value>),
        (status = 404, description = "No stored message references this peer")
    )
)]
#[axum::debug_handler]
pub async fn update_conversation(
    State(state): State<AppState>,
    Path(wa_id): Path<String>,
    Json(payload): Json<UpdateConversationPayload>,
) -> Result<impl IntoResponse> {
    let conversation = state.conversation_service.update(&wa_id, payload).await?;
    Ok(Json(conversation))
}
