use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessagePayload {
    #[validate(length(min = 1, message = "wa_id is required"))]
    pub wa_id: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: String,
}
