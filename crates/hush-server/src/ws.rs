//! The relay channel: `GET /ws`.
//!
//! The capability token is checked once, at upgrade time. After that the
//! connection speaks the JSON frame protocol from `hush-proto`; every frame
//! the server emits for this connection — acks, errors, pongs, broadcast
//! messages — flows through one outbound channel, so per-thread delivery
//! order is preserved end to end.

use std::time::Instant;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt as _, StreamExt as _};
use hush_core::ConnectionId;
use hush_crypto::ThreadId;
use hush_proto::{ClientFrame, ServerFrame, decode_client_frame};
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::state::{AppState, now_unix_ms};

/// Query parameters of the upgrade request.
#[derive(Deserialize)]
pub struct WsQuery {
    /// Capability token from a prior `POST /auth`.
    token: String,
}

/// `GET /ws`: authenticate the upgrade and hand the socket to the relay loop.
pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.is_wiping() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if !state.gate().lock().await.validate_token(&query.token, Instant::now()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_connection(state, socket))
}

async fn serve_connection(state: AppState, socket: WebSocket) {
    let conn_id = state.next_connection_id();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut closed = state.relay().register_connection(conn_id, tx.clone());
    tracing::debug!(conn_id, "relay connection open");

    let (mut sink, mut stream) = socket.split();

    // Writer task: drains the outbound channel onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Read until the peer goes away or the registry drops this connection
    // (a wipe's disconnect_all): the teardown signal resolving means this
    // socket may no longer exist, regardless of what the peer thinks.
    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                handle_frame(&state, conn_id, &tx, text.as_str());
            },
            _ = closed.changed() => break,
        }
    }

    state.relay().remove_connection(conn_id);
    writer.abort();
    tracing::debug!(conn_id, "relay connection closed");
}

fn handle_frame(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &UnboundedSender<ServerFrame>,
    raw: &str,
) {
    let frame = match decode_client_frame(raw, state.config().max_frame_bytes) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::debug!(conn_id, %error, "rejected client frame");
            let _ = tx.send(ServerFrame::Error { message: error.to_string() });
            return;
        },
    };

    match frame {
        ClientFrame::Ping => {
            let _ = tx.send(ServerFrame::Pong);
        },
        ClientFrame::Subscribe { thread_id } => {
            let Some(tid) = ThreadId::from_hex(&thread_id) else {
                let _ = tx.send(ServerFrame::Error { message: "invalid thread id shape".into() });
                return;
            };
            match state.relay().subscribe(conn_id, tid) {
                Ok(()) => {
                    let _ = tx.send(ServerFrame::Subscribed { thread_id });
                },
                Err(error) => {
                    tracing::debug!(conn_id, %error, "subscribe failed");
                    let _ = tx.send(ServerFrame::Error { message: "subscribe failed".into() });
                },
            }
        },
        ClientFrame::Unsubscribe { thread_id } => {
            let Some(tid) = ThreadId::from_hex(&thread_id) else {
                let _ = tx.send(ServerFrame::Error { message: "invalid thread id shape".into() });
                return;
            };
            state.relay().unsubscribe(conn_id, tid);
            let _ = tx.send(ServerFrame::Unsubscribed { thread_id });
        },
        ClientFrame::Message { thread_id, ciphertext, iv } => {
            let Some(tid) = ThreadId::from_hex(&thread_id) else {
                let _ = tx.send(ServerFrame::Error { message: "invalid thread id shape".into() });
                return;
            };
            if let Err(error) = state.relay().publish(conn_id, tid, ciphertext, iv, now_unix_ms()) {
                tracing::warn!(conn_id, %error, "publish failed");
                let _ = tx.send(ServerFrame::Error { message: "message not accepted".into() });
            }
        },
    }
}
