//! Chat history endpoint: the one bulk fetch a client makes on connect.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::chat_message::ChatHistoryEntry;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat/history", get(chat_history))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatHistoryEntry>,
}

#[utoipa::path(
    get,
    path = "/api/v1/protected/chat/history",
    tag = "Chat",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All chat messages, oldest first", body = ChatHistoryResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 500, description = "Store failure", body = ApiErrorBody),
    ),
)]
pub async fn chat_history(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ChatHistoryResponse>, ApiError> {
    let messages = state.store.get_chat_messages(user_id).await?;
    Ok(Json(ChatHistoryResponse { messages }))
}
