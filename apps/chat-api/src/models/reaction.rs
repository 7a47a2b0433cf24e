use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::schema::chat_messages_reactions;

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_messages_reactions)]
pub struct NewReaction {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
