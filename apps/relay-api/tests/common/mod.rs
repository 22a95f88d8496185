use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use relay_api::config::Config;
use relay_api::relay::responder::Responder;
use relay_api::AppState;

/// Deterministic responder for tests; optional delay simulates AI latency.
pub struct FakeResponder {
    pub answer: String,
    pub delay: Duration,
}

impl FakeResponder {
    pub fn answering(answer: &str) -> Arc<dyn Responder> {
        Arc::new(Self {
            answer: answer.to_string(),
            delay: Duration::from_millis(20),
        })
    }
}

#[async_trait]
impl Responder for FakeResponder {
    async fn respond(&self, _question: &str, _screen_context: Option<&str>) -> String {
        tokio::time::sleep(self.delay).await;
        self.answer.clone()
    }
}

/// Start an actual TCP server for WebSocket + REST testing. Returns
/// (addr, state); the server runs in the background.
pub async fn start_server(responder: Arc<dyn Responder>) -> (SocketAddr, AppState) {
    let state = AppState::new(Config::default(), responder);
    let app = relay_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    ws
}

pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Receive the next JSON frame, skipping transport pings.
pub async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("json frame")
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Drive a host/viewer pair through create + join, consuming the pairing
/// confirmations. Returns (session_id, code).
pub async fn pair(host: &mut WsClient, viewer: &mut WsClient) -> (String, String) {
    send_json(host, serde_json::json!({ "type": "create_session" })).await;
    let created = recv_json(host).await;
    assert_eq!(created["type"], "session_created");
    let session_id = created["sessionId"].as_str().unwrap().to_string();
    let code = created["connectionCode"].as_str().unwrap().to_string();

    send_json(
        viewer,
        serde_json::json!({ "type": "join_session", "connectionCode": code }),
    )
    .await;
    let joined = recv_json(viewer).await;
    assert_eq!(joined["type"], "session_joined");
    assert_eq!(joined["sessionId"], session_id.as_str());

    let notified = recv_json(host).await;
    assert_eq!(notified["type"], "phone_connected");

    (session_id, code)
}
