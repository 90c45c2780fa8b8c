//! Conversation history keyed by conversation id.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::ConversationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Normalize a client-supplied role. Anything unrecognised is treated as
    /// user input, matching how unknown roles are forwarded upstream.
    pub fn from_client(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "system" | "developer" => Self::System,
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Snapshot returned by [`ConversationStore::get_or_create`].
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    /// True when this call created the conversation.
    pub created: bool,
}

/// Storage for per-conversation message history.
///
/// Each `append` is atomic for its conversation. Two requests running turns on
/// the same id concurrently may still interleave their appends.
pub trait ConversationStore: Send + Sync {
    fn get_or_create(&self, id: &str) -> Conversation;

    /// Append messages in order and return the full history afterwards.
    fn append(&self, id: &str, messages: &[Message]) -> Vec<Message>;

    fn history(&self, id: &str) -> Option<Vec<Message>>;

    fn evict(&self, id: &str);
}

type History = Arc<Mutex<Vec<Message>>>;

/// A panic mid-append leaves the history usable; keep whatever it holds.
fn lock(history: &History) -> MutexGuard<'_, Vec<Message>> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process store with capacity and idle-time eviction.
pub struct InMemoryConversationStore {
    cache: Cache<String, History>,
}

impl InMemoryConversationStore {
    pub fn new(config: &ConversationConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_idle(Duration::from_secs(config.idle_ttl_secs))
            .build();
        Self { cache }
    }

    fn entry(&self, id: &str) -> (History, bool) {
        let entry = self
            .cache
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())));
        let created = entry.is_fresh();
        (entry.into_value(), created)
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn get_or_create(&self, id: &str) -> Conversation {
        let (history, created) = self.entry(id);
        let messages = lock(&history).clone();
        if created {
            tracing::info!(conversation_id = %id, "New conversation started");
        } else {
            tracing::info!(
                conversation_id = %id,
                messages = messages.len(),
                "Continuing conversation"
            );
        }
        Conversation {
            id: id.to_string(),
            messages,
            created,
        }
    }

    fn append(&self, id: &str, messages: &[Message]) -> Vec<Message> {
        let (history, _) = self.entry(id);
        let mut guard = lock(&history);
        guard.extend_from_slice(messages);
        guard.clone()
    }

    fn history(&self, id: &str) -> Option<Vec<Message>> {
        self.cache.get(id).map(|h| lock(&h).clone())
    }

    fn evict(&self, id: &str) {
        self.cache.invalidate(id);
    }
}
