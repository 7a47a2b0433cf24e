//! Persistence port used by the chat hub and the history route.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::chat_message::ChatHistoryEntry;
use crate::models::user::User;

/// Durable storage for chat messages and reactions.
///
/// Backed by PostgreSQL in production and an in-memory map in tests. Every
/// method may be called concurrently from many sessions.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a new message and return its generated id.
    async fn save_chat_message(
        &self,
        author_id: Uuid,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;

    /// All messages, oldest first, with reaction data computed for `viewer_id`.
    async fn get_chat_messages(&self, viewer_id: Uuid) -> Result<Vec<ChatHistoryEntry>, StoreError>;

    /// Record a reaction. Reacting twice to the same message is a no-op.
    async fn add_reaction(&self, user_id: Uuid, message_id: Uuid) -> Result<(), StoreError>;

    async fn count_reactions(&self, message_id: Uuid) -> Result<i64, StoreError>;

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
}
