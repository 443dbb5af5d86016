pub mod conversation_dto;
pub mod message_dto;
pub mod webhook_dto;
