//! Integration tests for the display server
//!
//! Tests the following:
//! - Brightness and tab sync across socket clients
//! - HTTP state endpoints and their validation
//! - Verbatim relay of unknown socket messages
//! - Rate-limited refresh

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use smart_clock::config::AppConfig;
use smart_clock::state::AppState;
use smart_clock::web::create_router;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    http: reqwest::Client,
    _static_dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>clock</h1>").unwrap();

        let mut config = AppConfig::default();
        config.web.static_dir = static_dir.path().to_string_lossy().to_string();
        config.capture.program = "true".to_string();
        config.webrtc.stun_servers = vec![];

        let state = AppState::new(config);
        let app = create_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            http: reqwest::Client::new(),
            _static_dir: static_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn connect(&self) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}/ws", self.addr)).await.unwrap();
        socket
    }

    async fn wait_for_clients(&self, n: usize) {
        timeout(Duration::from_secs(5), async {
            while self.state.hub.client_count().await.unwrap() != n {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

async fn next_text(socket: &mut Socket) -> String {
    timeout(Duration::from_secs(2), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {:?}", other),
            }
        }
    })
    .await
    .unwrap()
}

async fn next_json(socket: &mut Socket) -> Value {
    serde_json::from_str(&next_text(socket).await).unwrap()
}

async fn assert_silent(socket: &mut Socket) {
    let result = timeout(Duration::from_millis(300), socket.next()).await;
    assert!(result.is_err(), "unexpected message: {:?}", result);
}

#[tokio::test]
async fn test_socket_brightness_reaches_all_clients() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    let mut c = server.connect().await;
    server.wait_for_clients(3).await;

    send_json(&mut a, json!({"type": "set-brightness", "brightness": 75})).await;

    let expected = json!({"type": "brightness-update", "brightness": 75});
    assert_eq!(next_json(&mut b).await, expected);
    assert_eq!(next_json(&mut c).await, expected);
    assert_eq!(next_json(&mut a).await, expected);

    let body: Value = server
        .http
        .get(server.url("/api/brightness"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"brightness": 75}));
}

#[tokio::test]
async fn test_get_brightness_is_broadcast() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    server.wait_for_clients(2).await;

    send_json(&mut a, json!({"type": "get-brightness"})).await;

    let expected = json!({"type": "brightness-update", "brightness": 50});
    assert_eq!(next_json(&mut a).await, expected);
    assert_eq!(next_json(&mut b).await, expected);
}

#[tokio::test]
async fn test_out_of_range_socket_brightness_is_ignored() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    server.wait_for_clients(1).await;

    send_json(&mut a, json!({"type": "set-brightness", "brightness": 150})).await;
    send_json(&mut a, json!({"type": "set-tab", "tab": "bogus"})).await;

    assert_silent(&mut a).await;
    assert_eq!(server.state.display.brightness(), 50);
}

#[tokio::test]
async fn test_http_tab_validation_and_broadcast() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    server.wait_for_clients(2).await;

    let bogus = server
        .http
        .post(server.url("/api/tab/set"))
        .json(&json!({"tab": "bogus"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bogus.status(), 400);
    let error: Value = bogus.json().await.unwrap();
    assert_eq!(error["success"], json!(false));

    let ok = server
        .http
        .post(server.url("/api/tab/set"))
        .json(&json!({"tab": "settings"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.json::<Value>().await.unwrap(), json!({"tab": "settings"}));

    let expected = json!({"type": "tab-update", "tab": "settings"});
    assert_eq!(next_json(&mut a).await, expected);
    assert_eq!(next_json(&mut b).await, expected);

    let current: Value = server
        .http
        .get(server.url("/api/tab"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current, json!({"tab": "settings"}));
}

#[tokio::test]
async fn test_http_brightness_validation() {
    let server = TestServer::start().await;

    for body in [json!({"brightness": 101}), json!({"brightness": -1}), json!({"level": 3})] {
        let response = server
            .http
            .post(server.url("/api/brightness/set"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "body {}", body);
    }

    let response = server
        .http
        .post(server.url("/api/brightness/set"))
        .json(&json!({"brightness": 20}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(server.state.display.brightness(), 20);
}

#[tokio::test]
async fn test_unknown_message_relayed_verbatim() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    server.wait_for_clients(2).await;

    let raw = r#"{"type":"weather-update","temp":21.5,"units":"C"}"#;
    a.send(Message::Text(raw.to_string())).await.unwrap();

    assert_eq!(next_text(&mut b).await, raw);
    assert_eq!(next_text(&mut a).await, raw);
}

#[tokio::test]
async fn test_untyped_message_relayed_verbatim() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    server.wait_for_clients(2).await;

    a.send(Message::Text(r#"{"foo":1}"#.to_string())).await.unwrap();
    assert_eq!(next_text(&mut b).await, r#"{"foo":1}"#);

    a.send(Message::Text(r#"{"type":null,"x":1}"#.to_string())).await.unwrap();
    assert_eq!(next_text(&mut b).await, r#"{"type":null,"x":1}"#);

    // Not JSON: dropped
    a.send(Message::Text("hello".to_string())).await.unwrap();
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_refresh_is_rate_limited_per_client() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    server.wait_for_clients(1).await;

    let response = server
        .http
        .post(server.url("/api/refresh"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"status": "refresh sent"})
    );
    assert_eq!(next_json(&mut a).await, json!({"type": "refresh"}));

    // Within the cooldown: over HTTP and over the socket
    server
        .http
        .post(server.url("/api/refresh"))
        .send()
        .await
        .unwrap();
    send_json(&mut a, json!({"type": "refresh"})).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_closed_socket_is_unregistered() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let _b = server.connect().await;
    server.wait_for_clients(2).await;

    a.close(None).await.unwrap();
    server.wait_for_clients(1).await;
}

#[tokio::test]
async fn test_candidate_before_offer_keeps_connection() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    server.wait_for_clients(1).await;

    send_json(
        &mut a,
        json!({"type": "ice-candidate", "candidate": {"candidate": "candidate:1 1 udp 1 10.0.0.2 5000 typ host", "sdpMid": "0", "sdpMLineIndex": 0}}),
    )
    .await;
    send_json(&mut a, json!({"type": "get-tab"})).await;

    assert_eq!(next_json(&mut a).await, json!({"type": "tab-update", "tab": "clock"}));
}

#[tokio::test]
async fn test_info_endpoints() {
    let server = TestServer::start().await;

    let health: Value = server
        .http
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], json!("ok"));

    let config: Value = server
        .http
        .get(server.url("/api/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(config["timezone"].is_string());

    let snap: Value = server
        .http
        .get(server.url("/api/snap/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(snap["running"].is_boolean());
    assert!(snap["message"].as_str().unwrap().starts_with("Snapclient"));

    let audio: Value = server
        .http
        .get(server.url("/api/audio/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(audio["capture"], json!("stopped"));
    assert_eq!(audio["subscribers"], json!(0));
    assert_eq!(audio["webrtc_sessions"], json!(0));
    assert_eq!(audio["tracks"]["packets_sent"], json!(0));

    let index = server
        .http
        .get(server.url("/index.html"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(index, "<h1>clock</h1>");
}
