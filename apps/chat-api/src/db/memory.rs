//! In-memory [`ChatStore`] for tests and database-less local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::db::store::ChatStore;
use crate::error::StoreError;
use crate::models::chat_message::{format_timestamp, ChatHistoryEntry, ChatMessage, SELF_USERNAME};
use crate::models::user::User;

pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    messages: Mutex<Vec<ChatMessage>>,
    /// `(message_id, user_id)` pairs.
    reactions: DashSet<(Uuid, Uuid)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            messages: Mutex::new(Vec::new()),
            reactions: DashSet::new(),
        }
    }

    /// Create a user with a fresh id. User management lives outside the chat
    /// subsystem, so this exists for tests and local seeding only.
    pub fn insert_user(&self, username: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn remove_user(&self, user_id: Uuid) {
        self.users.remove(&user_id);
    }

    fn message_exists(&self, message_id: Uuid) -> bool {
        self.messages.lock().iter().any(|m| m.id == message_id)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn save_chat_message(
        &self,
        author_id: Uuid,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.messages.lock().push(ChatMessage {
            id,
            user_id: author_id,
            message: text.to_string(),
            timestamp,
        });
        Ok(id)
    }

    async fn get_chat_messages(&self, viewer_id: Uuid) -> Result<Vec<ChatHistoryEntry>, StoreError> {
        let mut messages = self.messages.lock().clone();
        messages.sort_by_key(|m| m.timestamp);

        let entries = messages
            .into_iter()
            // Same inner join as the SQL store: authors that no longer exist drop out.
            .filter_map(|m| {
                let author = self.users.get(&m.user_id)?;
                let username = if m.user_id == viewer_id {
                    SELF_USERNAME.to_string()
                } else {
                    author.username.clone()
                };
                let reactions = self.reactions.iter().filter(|r| r.0 == m.id).count() as i64;
                Some(ChatHistoryEntry {
                    id: m.id,
                    username,
                    message: m.message,
                    timestamp: format_timestamp(m.timestamp),
                    reactions,
                    has_reacted: self.reactions.contains(&(m.id, viewer_id)),
                })
            })
            .collect();

        Ok(entries)
    }

    async fn add_reaction(&self, user_id: Uuid, message_id: Uuid) -> Result<(), StoreError> {
        if !self.message_exists(message_id) {
            return Err(StoreError::UnknownMessage(message_id));
        }
        self.reactions.insert((message_id, user_id));
        Ok(())
    }

    async fn count_reactions(&self, message_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.reactions.iter().filter(|r| r.0 == message_id).count() as i64)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }
}
