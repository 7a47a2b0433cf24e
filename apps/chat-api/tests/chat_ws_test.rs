mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use http::header::{AUTHORIZATION, COOKIE};
use http::HeaderValue;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use chat_api::db::store::ChatStore;
use chat_api::AppState;

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start an actual TCP server for WebSocket testing.
async fn start_ws_server() -> (SocketAddr, AppState, std::sync::Arc<chat_api::db::memory::MemoryStore>) {
    let (app, state, store) = common::test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, store)
}

fn chat_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/api/v1/protected/ws/chat")
}

/// Helper: connect with a bearer token and wait until the hub sees `expected` sessions.
async fn connect(addr: SocketAddr, state: &AppState, token: &str, expected: usize) -> Client {
    let mut request = chat_url(addr).into_client_request().unwrap();
    request.headers_mut().insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("ws connect");
    wait_for_sessions(state, expected).await;
    ws
}

async fn wait_for_sessions(state: &AppState, expected: usize) {
    time::timeout(Duration::from_secs(5), async {
        while state.hub.session_count().await != expected {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timeout waiting for hub registration");
}

async fn send_json(ws: &mut Client, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

async fn next_json(ws: &mut Client) -> serde_json::Value {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout waiting for frame")
        .expect("stream ended")
        .expect("ws read error");
    let text = msg.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse frame")
}

async fn assert_silent(ws: &mut Client) {
    let res = time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(res.is_err(), "expected no frame, got {res:?}");
}

// ---------------------------------------------------------------------------
// Upgrade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upgrade_without_credentials_is_rejected() {
    let (addr, state, _store) = start_ws_server().await;

    match tokio_tungstenite::connect_async(chat_url(addr)).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 401),
        Err(other) => panic!("expected HTTP 401, got {other:?}"),
        Ok(_) => panic!("upgrade should fail without credentials"),
    }
    assert_eq!(state.hub.session_count().await, 0);
}

#[tokio::test]
async fn upgrade_with_cookie_token() {
    let (addr, state, store) = start_ws_server().await;
    let (_user, token) = common::user_with_token(&store, "cookie_user");

    let mut request = chat_url(addr).into_client_request().unwrap();
    request.headers_mut().insert(
        COOKIE,
        HeaderValue::from_str(&format!("jwt_token={token}")).unwrap(),
    );
    let (_ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("ws connect");

    wait_for_sessions(&state, 1).await;
}

// ---------------------------------------------------------------------------
// Posting and reacting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_is_broadcast_to_everyone_with_author_name() {
    let (addr, state, store) = start_ws_server().await;
    let (alice, alice_token) = common::user_with_token(&store, "alice");
    let (_bob, bob_token) = common::user_with_token(&store, "bob");

    let mut alice_ws = connect(addr, &state, &alice_token, 1).await;
    let mut bob_ws = connect(addr, &state, &bob_token, 2).await;

    // The claimed username is ignored.
    send_json(
        &mut alice_ws,
        serde_json::json!({ "message": "hello everyone", "username": "mallory" }),
    )
    .await;

    for ws in [&mut alice_ws, &mut bob_ws] {
        let frame = next_json(ws).await;
        assert_eq!(frame["username"], "alice");
        assert_eq!(frame["message"], "hello everyone");
        assert_eq!(frame["reactions"], 0);
        assert!(frame["id"].is_string());
        assert!(frame["timestamp"].is_string());
        assert!(frame.get("type").is_none());
    }

    let history = store.get_chat_messages(alice.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "hello everyone");
}

#[tokio::test]
async fn reaction_is_counted_once_per_user() {
    let (addr, state, store) = start_ws_server().await;
    let (alice, alice_token) = common::user_with_token(&store, "alice");
    let (_bob, bob_token) = common::user_with_token(&store, "bob");

    let message_id = store
        .save_chat_message(alice.id, "react to me", chrono::Utc::now())
        .await
        .unwrap();

    let mut alice_ws = connect(addr, &state, &alice_token, 1).await;
    let mut bob_ws = connect(addr, &state, &bob_token, 2).await;

    let reaction = serde_json::json!({ "type": "reaction", "messageId": message_id.to_string() });
    send_json(&mut bob_ws, reaction.clone()).await;

    for ws in [&mut alice_ws, &mut bob_ws] {
        let frame = next_json(ws).await;
        assert_eq!(frame["type"], "reaction");
        assert_eq!(frame["messageId"], message_id.to_string());
        assert_eq!(frame["username"], "bob");
        assert_eq!(frame["reactions"], 1);
    }

    // A repeat still reports the unchanged total.
    send_json(&mut bob_ws, reaction).await;
    let frame = next_json(&mut alice_ws).await;
    assert_eq!(frame["reactions"], 1);
    assert_eq!(store.count_reactions(message_id).await.unwrap(), 1);
}

#[tokio::test]
async fn reaction_to_unknown_message_is_not_broadcast() {
    let (addr, state, store) = start_ws_server().await;
    let (_alice, alice_token) = common::user_with_token(&store, "alice");
    let (_bob, bob_token) = common::user_with_token(&store, "bob");

    let mut alice_ws = connect(addr, &state, &alice_token, 1).await;
    let mut bob_ws = connect(addr, &state, &bob_token, 2).await;

    send_json(
        &mut alice_ws,
        serde_json::json!({ "type": "reaction", "messageId": uuid::Uuid::new_v4().to_string() }),
    )
    .await;
    assert_silent(&mut bob_ws).await;
    assert_eq!(state.hub.session_count().await, 2);
}

#[tokio::test]
async fn malformed_frames_do_not_end_the_session() {
    let (addr, state, store) = start_ws_server().await;
    let (_alice, alice_token) = common::user_with_token(&store, "alice");

    let mut ws = connect(addr, &state, &alice_token, 1).await;

    ws.send(tungstenite::Message::Text("not-json".into()))
        .await
        .unwrap();
    send_json(&mut ws, serde_json::json!({ "message": "" })).await;
    send_json(&mut ws, serde_json::json!({ "type": "reaction", "messageId": "nope" })).await;
    send_json(&mut ws, serde_json::json!({ "message": "still here" })).await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["message"], "still here");
    assert_eq!(state.hub.session_count().await, 1);
}

#[tokio::test]
async fn posts_from_one_client_arrive_in_order() {
    let (addr, state, store) = start_ws_server().await;
    let (_alice, alice_token) = common::user_with_token(&store, "alice");
    let (_bob, bob_token) = common::user_with_token(&store, "bob");

    let mut alice_ws = connect(addr, &state, &alice_token, 1).await;
    let mut bob_ws = connect(addr, &state, &bob_token, 2).await;

    for i in 0..10 {
        send_json(&mut alice_ws, serde_json::json!({ "message": format!("m{i}") })).await;
    }
    for i in 0..10 {
        let frame = next_json(&mut bob_ws).await;
        assert_eq!(frame["message"], format!("m{i}"));
    }
}

// ---------------------------------------------------------------------------
// Disconnects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closing_a_client_unregisters_only_that_session() {
    let (addr, state, store) = start_ws_server().await;
    let (_alice, alice_token) = common::user_with_token(&store, "alice");
    let (_bob, bob_token) = common::user_with_token(&store, "bob");

    let mut alice_ws = connect(addr, &state, &alice_token, 1).await;
    let mut bob_ws = connect(addr, &state, &bob_token, 2).await;

    alice_ws.close(None).await.unwrap();
    wait_for_sessions(&state, 1).await;

    send_json(&mut bob_ws, serde_json::json!({ "message": "anyone?" })).await;
    let frame = next_json(&mut bob_ws).await;
    assert_eq!(frame["username"], "bob");
}

#[tokio::test]
async fn dropped_connection_unregisters_session() {
    let (addr, state, store) = start_ws_server().await;
    let (_alice, alice_token) = common::user_with_token(&store, "alice");

    let ws = connect(addr, &state, &alice_token, 1).await;
    drop(ws);

    wait_for_sessions(&state, 0).await;
}
