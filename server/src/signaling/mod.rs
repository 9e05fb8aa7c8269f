//! Signaling Stream
//!
//! One WebSocket per peer. The socket task owns the connection state, a
//! writer task drains the outbound channel, and the router fans frames out
//! to the other room member.

pub mod audit;
pub mod registry;
pub mod router;

// Re-exports
pub use registry::PeerRegistry;
pub use router::{ConnState, FrameFlow};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tandem_common::{ClientFrame, ServerFrame};

use crate::api::AppState;
use crate::ip::{extract_client_ip, normalize_ip};

/// Outbound frames buffered per peer before backpressure applies.
const OUTBOUND_BUFFER: usize = 64;

/// WebSocket upgrade handler for the signaling stream.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = extract_client_ip(&headers, Some(&ConnectInfo(addr)), state.config.trust_proxy);
    let source_ip = normalize_ip(ip);
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    ws.on_upgrade(move |socket| handle_socket(socket, state, source_ip, user_agent))
}

/// Handle one signaling connection until the stream closes.
async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    source_ip: String,
    user_agent: Option<String>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Per-peer outbound channel; sends are serialized by the writer task so
    // per-sender ordering is preserved end to end.
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);

    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let msg = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };

            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let mut conn = ConnState::new(source_ip, user_agent);
    debug!("Signaling stream opened");

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => {
                    if router::handle_frame(&state, &mut conn, &tx, frame).await == FrameFlow::Close
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Malformed signaling frame: {}", e);
                    let _ = tx
                        .send(ServerFrame::Error {
                            error: "Malformed frame".into(),
                        })
                        .await;
                }
            },
            Ok(Message::Close(_)) => {
                info!("Signaling stream closed by peer");
                break;
            }
            Ok(_) => {} // Binary/ping/pong ignored; axum answers pings itself
            Err(e) => {
                warn!("Signaling stream error: {}", e);
                break;
            }
        }
    }

    router::handle_disconnect(&state, &conn).await;
    writer_handle.abort();
    debug!("Signaling stream task finished");
}
