//! WebSocket upgrade route and connection entry point.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::AppState;

use super::session::{self, Identity};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/chat", get(ws_upgrade))
}

/// Credentials are checked by `AuthUser` before the upgrade, so an
/// unauthenticated client gets a 401 and never a socket.
async fn ws_upgrade(
    AuthUser { user_id }: AuthUser,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_new_connection(socket, state, user_id))
}

/// Resolve the user's name, then run the chat session until the connection ends.
pub async fn handle_new_connection(mut socket: WebSocket, state: AppState, user_id: Uuid) {
    let user = match state.store.get_user_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(%user_id, "user vanished before chat session start");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
        Err(err) => {
            tracing::error!(%user_id, %err, "failed to load user for chat session");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let identity = Identity {
        user_id: user.id,
        username: user.username,
    };
    let (sink, stream) = socket.split();
    session::run_connection(
        sink,
        stream,
        identity,
        state.store.clone(),
        state.hub.clone(),
        state.config.hub,
    )
    .await;
}
