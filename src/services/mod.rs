pub mod canonicalizer;
pub mod conversation_service;
pub mod message_service;
pub mod realtime_service;
pub mod webhook_service;
