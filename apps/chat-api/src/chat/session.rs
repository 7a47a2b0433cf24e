//! Per-connection chat session: inbound read loop and outbound writer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use chat_common::id::{prefix, prefixed_ulid};
use chrono::Utc;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::config::HubConfig;
use crate::db::store::ChatStore;
use crate::error::StoreError;
use crate::models::chat_message::format_timestamp;

use super::hub::{ChatHub, Outgoing, SessionHandle};
use super::protocol::{self, ChatPosted, Inbound, Outbound, ReactionUpdated};

/// The authenticated user behind a session, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

/// State for a single chat connection.
pub struct Session {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub conn_id: String,
    pub identity: Identity,
    store: Arc<dyn ChatStore>,
    hub: ChatHub,
    send_timeout: Duration,
}

impl Session {
    pub fn new(identity: Identity, store: Arc<dyn ChatStore>, hub: ChatHub, config: HubConfig) -> Self {
        Self {
            conn_id: prefixed_ulid(prefix::CONNECTION),
            identity,
            store,
            hub,
            send_timeout: config.send_timeout,
        }
    }

    /// Perform the action a client frame asks for and return the envelope to
    /// broadcast. Undecodable frames and failed store calls yield `None`.
    pub async fn handle_frame(&self, frame: &[u8]) -> Option<Outbound> {
        let inbound = match protocol::decode(frame) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::debug!(conn_id = %self.conn_id, %err, "ignoring undecodable frame");
                return None;
            }
        };

        let result = match inbound {
            Inbound::Post { message } => self.post(message).await,
            Inbound::Reaction { message_id } => self.react(message_id).await,
        };

        match result {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                tracing::warn!(
                    conn_id = %self.conn_id,
                    user_id = %self.identity.user_id,
                    %err,
                    "chat action failed; nothing broadcast"
                );
                None
            }
        }
    }

    async fn post(&self, message: String) -> Result<Outbound, StoreError> {
        let now = Utc::now();
        let id = self
            .store
            .save_chat_message(self.identity.user_id, &message, now)
            .await?;

        Ok(ChatPosted {
            id,
            username: self.identity.username.clone(),
            message,
            timestamp: format_timestamp(now),
            reactions: 0,
        }
        .into())
    }

    async fn react(&self, message_id: Uuid) -> Result<Outbound, StoreError> {
        self.store.add_reaction(self.identity.user_id, message_id).await?;
        let reactions = self.store.count_reactions(message_id).await?;

        Ok(ReactionUpdated {
            message_id,
            username: self.identity.username.clone(),
            reactions,
        }
        .into())
    }

    /// Read frames until the client goes away or the writer stops, then leave
    /// the hub. `writer` is the task draining this session's outbound queue.
    pub async fn run<R, E>(self, mut inbound: R, mut writer: JoinHandle<()>)
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let mut writer_done = false;

        loop {
            tokio::select! {
                frame = inbound.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.dispatch(text.as_str().as_bytes()).await,
                        Some(Ok(Message::Binary(data))) => self.dispatch(&data).await,
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                        Some(Ok(Message::Close(reason))) => {
                            tracing::debug!(conn_id = %self.conn_id, ?reason, "client closed");
                            break;
                        }
                        Some(Err(err)) => {
                            tracing::debug!(conn_id = %self.conn_id, %err, "ws read error");
                            break;
                        }
                        None => break,
                    }
                }

                _ = &mut writer => {
                    tracing::debug!(conn_id = %self.conn_id, "outbound side closed");
                    writer_done = true;
                    break;
                }
            }
        }

        self.hub.unregister(&self.conn_id).await;

        // Give the writer a moment to flush and send the close frame.
        if !writer_done && time::timeout(self.send_timeout, &mut writer).await.is_err() {
            writer.abort();
        }
    }

    async fn dispatch(&self, frame: &[u8]) {
        if let Some(envelope) = self.handle_frame(frame).await {
            self.hub.broadcast(envelope).await;
        }
    }
}

/// Drain a session's outbound queue into its socket.
///
/// Each write is bounded by `deadline`; a failed or late write ends the task,
/// which in turn ends the session's read loop.
pub async fn write_frames<W>(
    mut sink: W,
    mut outbound: mpsc::Receiver<Outgoing>,
    deadline: Duration,
    conn_id: String,
) where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display + Send,
{
    while let Some(frame) = outbound.recv().await {
        let message = match frame {
            Outgoing::Text(text) => Message::Text(text),
            Outgoing::Close => break,
        };

        match time::timeout(deadline, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(conn_id = %conn_id, %err, "ws write error");
                return;
            }
            Err(_) => {
                tracing::debug!(conn_id = %conn_id, ?deadline, "ws write timed out");
                return;
            }
        }
    }

    let _ = time::timeout(deadline, sink.close()).await;
}

/// Run one authenticated connection to completion: start its writer,
/// register it with the hub and read until it ends.
pub async fn run_connection<W, R, E>(
    sink: W,
    inbound: R,
    identity: Identity,
    store: Arc<dyn ChatStore>,
    hub: ChatHub,
    config: HubConfig,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: fmt::Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let session = Session::new(identity, store, hub.clone(), config);
    let (tx, rx) = mpsc::channel(config.outbound_queue);
    let writer = tokio::spawn(write_frames(sink, rx, config.send_timeout, session.conn_id.clone()));

    tracing::info!(
        conn_id = %session.conn_id,
        user_id = %session.identity.user_id,
        username = %session.identity.username,
        "chat session established"
    );

    hub.register(SessionHandle::new(
        session.conn_id.clone(),
        session.identity.clone(),
        tx,
    ))
    .await;

    let conn_id = session.conn_id.clone();
    let user_id = session.identity.user_id;
    session.run(inbound, writer).await;

    tracing::info!(conn_id = %conn_id, user_id = %user_id, "chat session ended");
}
