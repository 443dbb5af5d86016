pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    conversation_service::ConversationService, message_service::MessageService,
    realtime_service::RealtimeService, webhook_service::WebhookService,
};
use sqlx::PgPool;

/// Capacity of the realtime broadcast channel; a subscriber that falls
/// this far behind starts losing events.
const REALTIME_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub realtime: RealtimeService,
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
    pub webhook_service: WebhookService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let realtime = RealtimeService::new(REALTIME_CHANNEL_CAPACITY);
        let conversation_service = ConversationService::new(pool.clone());
        let message_service = MessageService::new(pool.clone(), realtime.clone());
        let webhook_service = WebhookService::new(pool.clone(), realtime.clone());

        Self {
            pool,
            realtime,
            conversation_service,
            message_service,
            webhook_service,
        }
    }
}
