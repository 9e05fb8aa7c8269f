//! Signaling frame taxonomy.
//!
//! JSON text frames over the signaling stream. Variant tags are kebab-case,
//! field keys camelCase. Every frame carries the sender's `sessionId`; the
//! client discards frames whose session id does not match the incarnation it
//! is talking to.

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionMode, PeerId, Role, RoomCode, SessionId};

/// Fixed raw chunk size for file transfer; chunks travel base64-encoded.
pub const FILE_CHUNK_SIZE: usize = 16384;

/// File transfer announcement.
///
/// `from`/`from_nickname` are filled in by the coordinator during relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<PeerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_nickname: Option<String>,
}

/// Noise-cancellation toggle relayed between peers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NcStatus {
    pub enabled: bool,
}

/// Membership summary delivered inside `joined`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub nickname: String,
    pub session_id: SessionId,
}

/// Frames sent client → coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Enter a room. Must be the first frame on the stream.
    Join {
        room_id: RoomCode,
        peer_id: PeerId,
        nickname: String,
        session_id: SessionId,
    },
    /// SDP offer, relayed verbatim.
    Offer {
        session_id: SessionId,
        data: serde_json::Value,
    },
    /// SDP answer, relayed verbatim.
    Answer {
        session_id: SessionId,
        data: serde_json::Value,
    },
    /// ICE candidate init, relayed verbatim.
    IceCandidate {
        session_id: SessionId,
        data: serde_json::Value,
    },
    /// Chat payload, relayed verbatim.
    Chat {
        session_id: SessionId,
        data: serde_json::Value,
    },
    FileMetadata {
        session_id: SessionId,
        data: FileMetadata,
    },
    /// One base64-encoded chunk of at most [`FILE_CHUNK_SIZE`] raw bytes.
    FileChunk {
        session_id: SessionId,
        data: String,
    },
    FileEof {
        session_id: SessionId,
        data: Option<serde_json::Value>,
    },
    NcStatus {
        session_id: SessionId,
        data: NcStatus,
    },
    /// Controller-originated: both peers rebuild relay-only.
    RelayRestart { session_id: SessionId },
    /// Controller-originated: the detected mode, mirrored by the follower.
    ConnectionMode {
        session_id: SessionId,
        mode: ConnectionMode,
    },
    /// Explicit hang-up; fans out to the other member as `session-end`.
    EndSession { session_id: SessionId },
    /// Keepalive, no-op on the coordinator.
    Ping { session_id: SessionId },
}

impl ClientFrame {
    /// The session id stamped on this frame.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        match self {
            Self::Join { session_id, .. }
            | Self::Offer { session_id, .. }
            | Self::Answer { session_id, .. }
            | Self::IceCandidate { session_id, .. }
            | Self::Chat { session_id, .. }
            | Self::FileMetadata { session_id, .. }
            | Self::FileChunk { session_id, .. }
            | Self::FileEof { session_id, .. }
            | Self::NcStatus { session_id, .. }
            | Self::RelayRestart { session_id }
            | Self::ConnectionMode { session_id, .. }
            | Self::EndSession { session_id }
            | Self::Ping { session_id } => *session_id,
        }
    }
}

/// Frames sent coordinator → client.
///
/// Relayed variants carry `from` (the sending peer's id) injected by the
/// coordinator; clients never supply it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Join accepted.
    Joined {
        role: Role,
        existing_peers: Vec<PeerInfo>,
    },
    /// The other member arrived.
    PeerJoined {
        peer_id: PeerId,
        nickname: String,
        session_id: SessionId,
    },
    /// Role promotion after the controller left.
    RoleUpdate { role: Role },
    Offer {
        from: PeerId,
        session_id: SessionId,
        data: serde_json::Value,
    },
    Answer {
        from: PeerId,
        session_id: SessionId,
        data: serde_json::Value,
    },
    IceCandidate {
        from: PeerId,
        session_id: SessionId,
        data: serde_json::Value,
    },
    Chat {
        from: PeerId,
        session_id: SessionId,
        data: serde_json::Value,
    },
    FileMetadata {
        from: PeerId,
        from_nickname: String,
        session_id: SessionId,
        data: FileMetadata,
    },
    FileChunk {
        from: PeerId,
        session_id: SessionId,
        data: String,
    },
    FileEof {
        from: PeerId,
        session_id: SessionId,
        data: Option<serde_json::Value>,
    },
    NcStatus {
        from: PeerId,
        session_id: SessionId,
        data: NcStatus,
    },
    RelayRestart {
        from: PeerId,
        session_id: SessionId,
    },
    ConnectionMode {
        from: PeerId,
        session_id: SessionId,
        mode: ConnectionMode,
    },
    /// The other member disconnected. Carries the departed incarnation's
    /// session id so stale copies can be filtered after a refresh.
    PeerLeft {
        peer_id: PeerId,
        session_id: SessionId,
    },
    /// The other member hung up.
    SessionEnd { session_id: SessionId },
    /// In-band failure (unknown room, room full, not joined).
    Error { error: String },
}
