//! Signaling Transport
//!
//! WebSocket connection to the coordinator with automatic reconnection. The
//! transport only retries the socket itself, never content: every re-open is
//! reported to the driver, which hard-resets the engine and rejoins under a
//! fresh session id.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use tandem_common::{ClientFrame, ServerFrame};

use crate::error::SessionError;

/// Capability for pushing frames to the coordinator.
///
/// Sends are enqueue-only so the single-threaded engine never blocks on the
/// network; the transport task drains the queue in order.
pub trait SignalSender: Send + Sync {
    fn send(&self, frame: ClientFrame) -> Result<(), SessionError>;

    fn close(&self);
}

/// Transport lifecycle events delivered to the driver.
#[derive(Debug)]
pub enum TransportEvent {
    /// Socket (re)connected; the engine must (re)join.
    Open,
    /// One inbound frame.
    Frame(ServerFrame),
    /// Socket lost; a reconnect attempt follows unless closed.
    Closed,
}

/// WebSocket transport handle.
pub struct WsTransport {
    tx: mpsc::UnboundedSender<ClientFrame>,
    shutdown_tx: mpsc::Sender<()>,
}

impl WsTransport {
    /// Start the connection loop against a coordinator base URL
    /// (`http(s)://host[:port]`). Returns the sender handle and the event
    /// stream for the driver.
    #[must_use]
    pub fn connect(server_url: &str) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let url = build_ws_url(server_url);
        tokio::spawn(async move {
            connection_loop(url, frame_rx, event_tx, shutdown_rx).await;
        });

        (
            Self {
                tx: frame_tx,
                shutdown_tx,
            },
            event_rx,
        )
    }
}

impl SignalSender for WsTransport {
    fn send(&self, frame: ClientFrame) -> Result<(), SessionError> {
        self.tx
            .send(frame)
            .map_err(|_| SessionError::TransportClosed)
    }

    fn close(&self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

/// Main connection loop with reconnection logic.
async fn connection_loop(
    url: String,
    mut frame_rx: mpsc::UnboundedReceiver<ClientFrame>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut attempt = 0u32;
    let max_backoff = Duration::from_secs(30);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!("Signaling transport shutdown requested");
            return;
        }

        info!(attempt, "Connecting signaling stream");

        match connect_async(&url).await {
            Ok((ws_stream, _)) => {
                info!("Signaling stream connected");
                attempt = 0;
                if event_tx.send(TransportEvent::Open).is_err() {
                    return;
                }

                let (mut write, mut read) = ws_stream.split();

                loop {
                    tokio::select! {
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<ServerFrame>(&text) {
                                        Ok(frame) => {
                                            if event_tx.send(TransportEvent::Frame(frame)).is_err() {
                                                return;
                                            }
                                        }
                                        Err(e) => {
                                            warn!("Failed to parse coordinator frame: {} - {}", e, text);
                                        }
                                    }
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    if let Err(e) = write.send(Message::Pong(data)).await {
                                        warn!("Failed to send pong: {}", e);
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    info!("Coordinator closed the signaling stream");
                                    break;
                                }
                                Some(Err(e)) => {
                                    error!("Signaling stream error: {}", e);
                                    break;
                                }
                                None => {
                                    info!("Signaling stream ended");
                                    break;
                                }
                                _ => {}
                            }
                        }

                        frame = frame_rx.recv() => {
                            if let Some(frame) = frame {
                                match serde_json::to_string(&frame) {
                                    Ok(json) => {
                                        debug!("Sending: {}", json);
                                        if let Err(e) = write.send(Message::Text(json.into())).await {
                                            error!("Failed to send frame: {}", e);
                                            break;
                                        }
                                    }
                                    Err(e) => error!("Failed to serialize frame: {}", e),
                                }
                            } else {
                                info!("Frame channel closed");
                                return;
                            }
                        }

                        _ = shutdown_rx.recv() => {
                            info!("Shutdown received during connection");
                            let _ = write.send(Message::Close(None)).await;
                            let _ = event_tx.send(TransportEvent::Closed);
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to connect signaling stream: {}", e);
            }
        }

        if event_tx.send(TransportEvent::Closed).is_err() {
            return;
        }

        attempt += 1;
        let backoff = std::cmp::min(Duration::from_secs(2u64.pow(attempt.min(5))), max_backoff);
        info!("Reconnecting in {:?} (attempt {})", backoff, attempt);

        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            _ = shutdown_rx.recv() => {
                info!("Shutdown during reconnect backoff");
                return;
            }
        }
    }
}

/// Build the signaling WebSocket URL from the coordinator base URL.
fn build_ws_url(server_url: &str) -> String {
    let base = server_url
        .replace("http://", "ws://")
        .replace("https://", "wss://");
    format!("{}/ws", base.trim_end_matches('/'))
}
