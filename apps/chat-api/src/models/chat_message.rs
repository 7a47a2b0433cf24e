use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::schema::chat_messages;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// One message as seen by a particular viewer in the chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryEntry {
    pub id: Uuid,
    /// Author's username, or `"You"` when the viewer wrote the message.
    pub username: String,
    pub message: String,
    /// RFC 3339, second precision.
    pub timestamp: String,
    pub reactions: i64,
    pub has_reacted: bool,
}

/// Username shown for the viewer's own messages.
pub const SELF_USERNAME: &str = "You";

/// Render a timestamp the way chat clients expect it (`2024-05-01T12:00:00Z`).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
