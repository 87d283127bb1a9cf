pub mod chat_client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod message;
pub mod session;
