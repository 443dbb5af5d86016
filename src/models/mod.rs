pub mod conversation;
pub mod message;
pub mod raw_payload;
