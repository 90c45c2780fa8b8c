pub mod chat_completions;
pub mod health;
pub mod models;
