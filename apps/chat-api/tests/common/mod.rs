use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use chat_api::chat::hub::ChatHub;
use chat_api::config::{Config, HubConfig};
use chat_api::db::memory::MemoryStore;
use chat_api::models::user::User;
use chat_api::AppState;

pub const TEST_SECRET: &str = "test-secret-do-not-use-in-production";

/// Build a test AppState backed by the in-memory store and a live hub.
///
/// The concrete store is returned alongside so tests can seed users.
pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    let config = Config {
        database_url: None,
        jwt_secret: TEST_SECRET.to_string(),
        port: 0,
        hub: HubConfig {
            send_timeout: Duration::from_millis(500),
            ..HubConfig::default()
        },
    };

    let store = Arc::new(MemoryStore::new());
    let (hub, _task) = ChatHub::spawn(config.hub);

    let state = AppState {
        store: store.clone(),
        hub,
        config: Arc::new(config),
    };

    (state, store)
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState, Arc<MemoryStore>) {
    let (state, store) = test_state();
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state, store)
}

/// Seed a user and return it with a freshly minted token.
pub fn user_with_token(store: &MemoryStore, username: &str) -> (User, String) {
    let user = store.insert_user(username);
    let token = chat_api::auth::jwt::mint_token(TEST_SECRET, user.id).expect("mint test token");
    (user, token)
}

// ---------------------------------------------------------------------------
// PostgreSQL fixtures
// ---------------------------------------------------------------------------

const MIGRATIONS: diesel_migrations::EmbeddedMigrations = diesel_migrations::embed_migrations!("./migrations");

static MIGRATED: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

/// Connect a `PgChatStore` to the `_test` variant of `DATABASE_URL`, applying
/// migrations on first use. Returns `None` when no database is configured.
pub async fn pg_store() -> Option<(chat_api::db::pg::PgChatStore, chat_api::db::pool::DbPool)> {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    let Some(database_url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) else {
        eprintln!("DATABASE_URL not set; skipping PostgreSQL test");
        return None;
    };
    let database_url = with_test_db_suffix(&database_url);

    MIGRATED
        .get_or_init(|| {
            let url = database_url.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    use diesel::Connection;
                    use diesel_migrations::MigrationHarness;

                    let mut conn = diesel::pg::PgConnection::establish(&url)
                        .expect("connect to test database");
                    conn.run_pending_migrations(MIGRATIONS)
                        .expect("run migrations");
                })
                .await
                .expect("migration task");
            }
        })
        .await;

    let pool = chat_api::db::pool::connect(&database_url).await;
    Some((chat_api::db::pg::PgChatStore::new(pool.clone()), pool))
}

fn with_test_db_suffix(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };
    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    let mut updated = format!("{prefix}/{db_name}_test");
    if let Some(query) = query {
        updated.push('?');
        updated.push_str(query);
    }
    updated
}

/// Insert a user row directly; user management lives outside the chat store.
pub async fn insert_pg_user(db: &chat_api::db::pool::DbPool, username: &str) -> uuid::Uuid {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    use chat_api::db::schema::users;

    let mut conn = db.get().await.expect("pool");
    let id = uuid::Uuid::new_v4();
    diesel::insert_into(users::table)
        .values((
            users::id.eq(id),
            users::username.eq(format!("{username}_{}", chat_common::prefixed_ulid("t"))),
        ))
        .execute(&mut conn)
        .await
        .expect("insert test user");
    id
}

/// Delete a test user; messages and reactions go with it.
pub async fn cleanup_pg_user(db: &chat_api::db::pool::DbPool, user_id: uuid::Uuid) {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    use chat_api::db::schema::users;

    let mut conn = db.get().await.expect("pool");
    diesel::delete(users::table.filter(users::id.eq(user_id)))
        .execute(&mut conn)
        .await
        .ok();
}
