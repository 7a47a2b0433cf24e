//! PostgreSQL [`ChatStore`] built on diesel-async.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError, OptionalExtension};
use uuid::Uuid;

use crate::db::pool::DbPool;
use crate::db::schema::{chat_messages, chat_messages_reactions, users};
use crate::db::store::ChatStore;
use crate::error::StoreError;
use crate::models::chat_message::{format_timestamp, ChatHistoryEntry, NewChatMessage, SELF_USERNAME};
use crate::models::reaction::NewReaction;
use crate::models::user::User;

const REACTION_MESSAGE_FKEY: &str = "chat_messages_reactions_message_id_fkey";

pub struct PgChatStore {
    pool: DbPool,
}

impl PgChatStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn save_chat_message(
        &self,
        author_id: Uuid,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let mut conn = self.pool.get().await?;

        let id: Uuid = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(chat_messages::table)
                .values(NewChatMessage {
                    id: Uuid::new_v4(),
                    user_id: author_id,
                    message: text,
                    timestamp,
                })
                .returning(chat_messages::id),
            &mut conn,
        )
        .await?;

        Ok(id)
    }

    async fn get_chat_messages(&self, viewer_id: Uuid) -> Result<Vec<ChatHistoryEntry>, StoreError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<(Uuid, Uuid, String, String, DateTime<Utc>)> = diesel_async::RunQueryDsl::load(
            chat_messages::table
                .inner_join(users::table)
                .order(chat_messages::timestamp.asc())
                .select((
                    chat_messages::id,
                    chat_messages::user_id,
                    users::username,
                    chat_messages::message,
                    chat_messages::timestamp,
                )),
            &mut conn,
        )
        .await?;

        let counts: Vec<(Uuid, i64)> = diesel_async::RunQueryDsl::load(
            chat_messages_reactions::table
                .group_by(chat_messages_reactions::message_id)
                .select((chat_messages_reactions::message_id, count_star())),
            &mut conn,
        )
        .await?;
        let counts: HashMap<Uuid, i64> = counts.into_iter().collect();

        let reacted: Vec<Uuid> = diesel_async::RunQueryDsl::load(
            chat_messages_reactions::table
                .filter(chat_messages_reactions::user_id.eq(viewer_id))
                .select(chat_messages_reactions::message_id),
            &mut conn,
        )
        .await?;
        let reacted: HashSet<Uuid> = reacted.into_iter().collect();

        let entries = rows
            .into_iter()
            .map(|(id, author_id, username, message, timestamp)| ChatHistoryEntry {
                id,
                username: if author_id == viewer_id {
                    SELF_USERNAME.to_string()
                } else {
                    username
                },
                message,
                timestamp: format_timestamp(timestamp),
                reactions: counts.get(&id).copied().unwrap_or(0),
                has_reacted: reacted.contains(&id),
            })
            .collect();

        Ok(entries)
    }

    async fn add_reaction(&self, user_id: Uuid, message_id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;

        let result = diesel_async::RunQueryDsl::execute(
            diesel::insert_into(chat_messages_reactions::table)
                .values(NewReaction {
                    message_id,
                    user_id,
                    created_at: Utc::now(),
                })
                .on_conflict_do_nothing(),
            &mut conn,
        )
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info))
                if info.constraint_name() == Some(REACTION_MESSAGE_FKEY) =>
            {
                Err(StoreError::UnknownMessage(message_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn count_reactions(&self, message_id: Uuid) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = diesel_async::RunQueryDsl::get_result(
            chat_messages_reactions::table
                .filter(chat_messages_reactions::message_id.eq(message_id))
                .count(),
            &mut conn,
        )
        .await?;

        Ok(count)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await?;

        let user = diesel_async::RunQueryDsl::get_result(
            users::table.find(user_id).select(User::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(user)
    }
}
