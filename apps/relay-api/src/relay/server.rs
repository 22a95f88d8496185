//! WebSocket upgrade handler and per-connection event loop.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::AppState;

use super::events::{ClientEvent, ServerEvent};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// One task per transport connection: reads client frames into the hub and
/// drains the connection's outbound queue back to the socket. Exiting the
/// loop for any reason, graceful close or abrupt drop, runs the same
/// registry/session cleanup.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let handle = state.registry.register(tx);
    tracing::debug!(conn = %handle, "connection opened");

    loop {
        tokio::select! {
            // Inbound frame from the client.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => state.hub.handle_event(&handle, event).await,
                            Err(err) => {
                                tracing::debug!(conn = %handle, %err, "malformed frame");
                                state.hub.reject_malformed(&handle);
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(conn = %handle, "unsupported binary frame");
                        state.hub.reject_malformed(&handle);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(conn = %handle, ?err, "ws read error");
                        break;
                    }
                }
            }

            // Outbound event queued by the hub for this connection.
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let json = serde_json::to_string(&event).unwrap();
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.hub.connection_closed(&handle).await;
    tracing::debug!(conn = %handle, "connection closed");
}
