//! The chat hub: a single task that owns the set of live sessions.
//!
//! Sessions never touch the registry directly. They enqueue commands on the
//! hub's input queue and the hub task applies them one at a time, so a
//! broadcast always sees a registry that is either before or after any given
//! register/unregister, never in between.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::HubConfig;

use super::protocol::Outbound;
use super::session::Identity;

/// A frame queued for one session's writer task.
#[derive(Debug, Clone)]
pub enum Outgoing {
    Text(Utf8Bytes),
    Close,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("session connection is closed")]
    Closed,
    #[error("session did not accept the frame within {0:?}")]
    TimedOut(Duration),
}

/// The hub's view of a registered session: who it is and where its frames go.
#[derive(Debug)]
pub struct SessionHandle {
    pub conn_id: String,
    pub identity: Identity,
    outbound: mpsc::Sender<Outgoing>,
}

impl SessionHandle {
    pub fn new(conn_id: String, identity: Identity, outbound: mpsc::Sender<Outgoing>) -> Self {
        Self {
            conn_id,
            identity,
            outbound,
        }
    }

    /// True once the session's writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Queue one frame for the session, waiting at most `deadline` for room.
    async fn send(&self, frame: Utf8Bytes, deadline: Duration) -> Result<(), DeliveryError> {
        match time::timeout(deadline, self.outbound.send(Outgoing::Text(frame))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::TimedOut(deadline)),
        }
    }

    /// Ask the writer to close the connection. Dropping the handle afterwards
    /// releases the last sender, so the writer stops even if the queue is full.
    fn close(self) {
        let _ = self.outbound.try_send(Outgoing::Close);
    }
}

enum HubCommand {
    Register(SessionHandle),
    Unregister(String),
    Broadcast(Outbound),
    SessionCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Cloneable handle to the hub task. Store in AppState.
#[derive(Clone)]
pub struct ChatHub {
    commands: mpsc::Sender<HubCommand>,
}

impl ChatHub {
    /// Start the hub task. It runs until [`ChatHub::shutdown`] is called or
    /// every handle has been dropped.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(config.command_queue);
        let coordinator = Coordinator {
            sessions: HashMap::new(),
            send_timeout: config.send_timeout,
        };
        let task = tokio::spawn(coordinator.run(rx));
        (Self { commands }, task)
    }

    /// Add a session to the set of broadcast targets.
    pub async fn register(&self, session: SessionHandle) {
        self.submit(HubCommand::Register(session)).await;
    }

    /// Remove a session and close its connection. Unknown ids are ignored.
    pub async fn unregister(&self, conn_id: &str) {
        self.submit(HubCommand::Unregister(conn_id.to_string())).await;
    }

    /// Deliver an envelope to every registered session.
    pub async fn broadcast(&self, envelope: Outbound) {
        self.submit(HubCommand::Broadcast(envelope)).await;
    }

    /// Number of registered sessions, or 0 once the hub has stopped.
    pub async fn session_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.submit(HubCommand::SessionCount(reply)).await;
        rx.await.unwrap_or(0)
    }

    /// Close every session and stop the hub task.
    pub async fn shutdown(&self) {
        self.submit(HubCommand::Shutdown).await;
    }

    async fn submit(&self, command: HubCommand) {
        if self.commands.send(command).await.is_err() {
            tracing::debug!("chat hub is stopped; command dropped");
        }
    }
}

/// State owned exclusively by the hub task.
struct Coordinator {
    sessions: HashMap<String, SessionHandle>,
    send_timeout: Duration,
}

impl Coordinator {
    async fn run(mut self, mut commands: mpsc::Receiver<HubCommand>) {
        tracing::info!("chat hub started");

        while let Some(command) = commands.recv().await {
            match command {
                HubCommand::Register(session) => self.register(session),
                HubCommand::Unregister(conn_id) => self.unregister(&conn_id),
                HubCommand::Broadcast(envelope) => self.broadcast(&envelope).await,
                HubCommand::SessionCount(reply) => {
                    let _ = reply.send(self.sessions.len());
                }
                HubCommand::Shutdown => break,
            }
        }

        let remaining = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            session.close();
        }
        tracing::info!(closed = remaining, "chat hub stopped");
    }

    fn register(&mut self, session: SessionHandle) {
        if session.is_closed() {
            tracing::debug!(conn_id = %session.conn_id, "ignoring registration of closed session");
            return;
        }

        tracing::debug!(
            conn_id = %session.conn_id,
            user_id = %session.identity.user_id,
            "session registered"
        );
        if let Some(previous) = self.sessions.insert(session.conn_id.clone(), session) {
            previous.close();
        }
    }

    fn unregister(&mut self, conn_id: &str) {
        if let Some(session) = self.sessions.remove(conn_id) {
            tracing::debug!(
                conn_id = %conn_id,
                user_id = %session.identity.user_id,
                "session unregistered"
            );
            session.close();
        }
    }

    async fn broadcast(&mut self, envelope: &Outbound) {
        let frame = match envelope.encode() {
            Ok(json) => Utf8Bytes::from(json),
            Err(err) => {
                tracing::error!(%err, "failed to encode broadcast envelope");
                return;
            }
        };

        let deadline = self.send_timeout;
        let deliveries = self.sessions.values().map(|session| {
            let frame = frame.clone();
            async move {
                session
                    .send(frame, deadline)
                    .await
                    .map_err(|err| (session.conn_id.clone(), err))
            }
        });

        let failed: Vec<(String, DeliveryError)> = join_all(deliveries)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        for (conn_id, err) in failed {
            tracing::debug!(conn_id = %conn_id, %err, "dropping session after failed delivery");
            self.unregister(&conn_id);
        }
    }
}
