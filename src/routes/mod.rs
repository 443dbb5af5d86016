pub mod conversations;
pub mod health;
pub mod messages;
pub mod realtime;
pub mod webhook;
