use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_api::chat::hub::ChatHub;
use chat_api::config::Config;
use chat_api::db::memory::MemoryStore;
use chat_api::db::pg::PgChatStore;
use chat_api::db::store::ChatStore;
use chat_api::AppState;

#[tokio::main]
async fn main() {
    // .env is optional; the environment may already be populated.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let store: Arc<dyn ChatStore> = match &config.database_url {
        Some(url) => Arc::new(PgChatStore::new(chat_api::db::pool::connect(url).await)),
        None => {
            tracing::warn!("DATABASE_URL not set; chat messages are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let (hub, hub_task) = ChatHub::spawn(config.hub);

    tracing::info!(
        send_timeout_ms = config.hub.send_timeout.as_millis() as u64,
        outbound_queue = config.hub.outbound_queue,
        "chat-api configured"
    );

    let state = AppState {
        store,
        hub: hub.clone(),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    hub.shutdown().await;
    let _ = hub_task.await;
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
