pub mod chat_id;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod proxy;
pub mod rate_limit;
pub mod types;
