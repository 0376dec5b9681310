//! End-to-end tests over real sockets using a `tokio-tungstenite` client.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use parley_server::{ChatPolicy, ParleyServer, ServerConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    server: ParleyServer,
    ws_url: String,
    http_addr: String,
    _handle: tokio::task::JoinHandle<()>,
}

async fn boot_with(config: ServerConfig) -> TestServer {
    let server = ParleyServer::new(config, &ChatPolicy::default());
    let (addr, handle) = server.listen().await.unwrap();
    TestServer {
        server,
        ws_url: format!("ws://{addr}/ws"),
        http_addr: addr.to_string(),
        _handle: handle,
    }
}

async fn boot() -> TestServer {
    boot_with(ServerConfig::default()).await
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Connect and consume the `request_nickname` greeting.
async fn join(url: &str) -> WsStream {
    let mut ws = connect(url).await;
    let greeting = read_json(&mut ws).await;
    assert_eq!(greeting, json!({"event": "request_nickname"}));
    ws
}

async fn send(ws: &mut WsStream, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn set_nickname(ws: &mut WsStream, nickname: &str) {
    send(ws, json!({"event": "set_nickname", "data": nickname})).await;
}

async fn say(ws: &mut WsStream, message: &str) {
    send(ws, json!({"event": "send_message", "data": {"message": message}})).await;
}

async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert nothing arrives within a short window.
async fn assert_silent(ws: &mut WsStream) {
    let got = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(got.is_err(), "unexpected frame: {got:?}");
}

/// Wait until the server reports `expected` open sockets.
async fn wait_for_connections(server: &ParleyServer, expected: usize) {
    timeout(TIMEOUT, async {
        while server.connections().count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection count never settled");
}

async fn register(url: &str, nickname: &str) -> WsStream {
    let mut ws = join(url).await;
    set_nickname(&mut ws, nickname).await;
    let _roster = read_json(&mut ws).await;
    let accepted = read_json(&mut ws).await;
    assert_eq!(accepted["event"], "nickname_accepted");
    ws
}

#[tokio::test]
async fn connect_receives_request_nickname() {
    let t = boot().await;
    let _ws = join(&t.ws_url).await;
}

#[tokio::test]
async fn alice_and_bob_chat() {
    let t = boot().await;

    let mut alice = join(&t.ws_url).await;
    set_nickname(&mut alice, "alice").await;
    assert_eq!(
        read_json(&mut alice).await,
        json!({"event": "user_list", "data": {"users": ["alice"]}})
    );
    assert_eq!(
        read_json(&mut alice).await,
        json!({"event": "nickname_accepted", "data": {"nickname": "alice"}})
    );

    let mut bob = join(&t.ws_url).await;
    set_nickname(&mut bob, "bob").await;
    assert_eq!(
        read_json(&mut bob).await,
        json!({"event": "user_list", "data": {"users": ["alice", "bob"]}})
    );
    assert_eq!(
        read_json(&mut bob).await,
        json!({"event": "nickname_accepted", "data": {"nickname": "bob"}})
    );
    assert_eq!(
        read_json(&mut alice).await,
        json!({"event": "user_join", "data": {"nickname": "bob"}})
    );
    assert_eq!(
        read_json(&mut alice).await,
        json!({"event": "user_list", "data": {"users": ["alice", "bob"]}})
    );

    say(&mut alice, "hi").await;
    let expected = json!({"event": "new_message", "data": {"nickname": "alice", "message": "hi"}});
    assert_eq!(read_json(&mut alice).await, expected);
    assert_eq!(read_json(&mut bob).await, expected);
}

#[tokio::test]
async fn unregistered_sender_gets_error() {
    let t = boot().await;
    let mut observer = register(&t.ws_url, "observer").await;
    let mut ws = join(&t.ws_url).await;

    say(&mut ws, "hello?").await;
    assert_eq!(
        read_json(&mut ws).await,
        json!({"event": "error", "data": {"message": "must register before sending"}})
    );
    assert_silent(&mut observer).await;
}

#[tokio::test]
async fn null_message_is_dropped_silently() {
    let t = boot().await;
    let mut alice = register(&t.ws_url, "alice").await;

    send(&mut alice, json!({"event": "send_message", "data": {"message": null}})).await;
    assert_silent(&mut alice).await;

    say(&mut alice, "after").await;
    assert_eq!(read_json(&mut alice).await["event"], "new_message");
}

#[tokio::test]
async fn malformed_frame_gets_error_and_session_continues() {
    let t = boot().await;
    let mut ws = join(&t.ws_url).await;

    ws.send(Message::text("{not json")).await.unwrap();
    let err = read_json(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert!(err["data"]["message"].as_str().unwrap().contains("malformed"));

    send(&mut ws, json!({"event": "launch_rockets"})).await;
    assert_eq!(read_json(&mut ws).await["event"], "error");

    set_nickname(&mut ws, "carol").await;
    assert_eq!(read_json(&mut ws).await["event"], "user_list");
}

#[tokio::test]
async fn binary_utf8_frames_are_accepted() {
    let t = boot().await;
    let mut ws = join(&t.ws_url).await;

    let frame = json!({"event": "set_nickname", "data": "dave"}).to_string();
    ws.send(Message::binary(frame.into_bytes())).await.unwrap();
    assert_eq!(
        read_json(&mut ws).await,
        json!({"event": "user_list", "data": {"users": ["dave"]}})
    );
}

#[tokio::test]
async fn socket_close_broadcasts_leave_and_roster() {
    let t = boot().await;
    let mut alice = register(&t.ws_url, "alice").await;
    let mut bob = register(&t.ws_url, "bob").await;
    let _ = read_json(&mut alice).await; // user_join bob
    let _ = read_json(&mut alice).await; // user_list

    bob.close(None).await.unwrap();
    assert_eq!(
        read_json(&mut alice).await,
        json!({"event": "user_leave", "data": {"nickname": "bob"}})
    );
    assert_eq!(
        read_json(&mut alice).await,
        json!({"event": "user_list", "data": {"users": ["alice"]}})
    );
    wait_for_connections(&t.server, 1).await;
    assert_eq!(t.server.chat().registry().snapshot(), vec!["alice"]);
}

#[tokio::test]
async fn disconnect_event_closes_socket() {
    let t = boot().await;
    let mut alice = register(&t.ws_url, "alice").await;
    let mut bob = register(&t.ws_url, "bob").await;
    let _ = read_json(&mut alice).await;
    let _ = read_json(&mut alice).await;

    send(&mut bob, json!({"event": "disconnect"})).await;
    assert_eq!(read_json(&mut alice).await["event"], "user_leave");

    // bob's stream ends with a close frame
    let closed = timeout(TIMEOUT, async {
        loop {
            match bob.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn unregistered_close_is_silent() {
    let t = boot().await;
    let mut alice = register(&t.ws_url, "alice").await;
    let mut lurker = join(&t.ws_url).await;

    lurker.close(None).await.unwrap();
    wait_for_connections(&t.server, 1).await;
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn connection_cap_refuses_upgrade() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let t = boot_with(config).await;
    let _first = join(&t.ws_url).await;

    let err = connect_async(&t.ws_url).await.unwrap_err();
    match err {
        WsError::Http(resp) => assert_eq!(resp.status(), 503),
        other => panic!("expected HTTP 503, got {other:?}"),
    }
}

#[tokio::test]
async fn health_reports_live_counts() {
    let t = boot().await;
    let _alice = register(&t.ws_url, "alice").await;
    let _lurker = join(&t.ws_url).await;
    wait_for_connections(&t.server, 2).await;

    let health = http_get_json(&t.http_addr, "/health").await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 2);
    assert_eq!(health["active_sessions"], 1);
}

#[tokio::test]
async fn stop_closes_open_sockets() {
    let t = boot().await;
    let mut ws = join(&t.ws_url).await;
    wait_for_connections(&t.server, 1).await;

    let TestServer {
        server,
        _handle: handle,
        ..
    } = t;
    server.stop(handle, Duration::from_secs(2)).await;

    assert_eq!(server.connections().count(), 0);
    let ended = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
}

async fn http_get_json(addr: &str, path: &str) -> Value {
    let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    assert!(resp.status().is_success(), "GET {path}: {}", resp.status());
    resp.json().await.unwrap()
}
