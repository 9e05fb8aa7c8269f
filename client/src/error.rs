//! Session engine errors.

use thiserror::Error;

use crate::peer::PeerError;

/// Errors surfaced by the session engine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The signaling transport is gone; the driver will reconnect with a
    /// fresh session id.
    #[error("Signaling transport closed")]
    TransportClosed,

    /// WebRTC engine failure.
    #[error("Peer connection error: {0}")]
    Peer(#[from] PeerError),

    /// A frame payload did not parse.
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}
