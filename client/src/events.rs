//! UI-facing session events.

use serde_json::Value;

use tandem_common::{ConnectionMode, FileMetadata, PeerId, Role};

use crate::peer::CandidateKind;

/// Coarse connection status surfaced to the UI.
///
/// `Reconnecting` only ever appears after a mode was locked and the
/// transport later degraded; the initial attempt shows `Connecting`
/// regardless of fallback churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Connected,
    Reconnecting,
}

/// Selected candidate pair summary shown alongside the mode.
#[derive(Debug, Clone)]
pub struct ConnectionDetails {
    pub local_kind: CandidateKind,
    pub remote_kind: CandidateKind,
    pub local_address: Option<String>,
    pub remote_address: Option<String>,
}

/// Events emitted by the session engine for the UI layer.
#[derive(Debug)]
pub enum SessionEvent {
    /// Join accepted; role assigned by the coordinator.
    Joined { role: Role },
    /// Role changed (controller promotion after the peer left).
    RoleUpdated { role: Role },
    PeerJoined { peer_id: PeerId, nickname: String },
    PeerLeft { peer_id: PeerId },
    /// The other peer hung up.
    SessionEnded,
    StatusChanged(SessionStatus),
    /// Connection mode locked for the rest of the session. `details` is
    /// present on the controller (which ran detection) and absent on the
    /// follower (which mirrors the broadcast value).
    ModeLocked {
        mode: ConnectionMode,
        details: Option<ConnectionDetails>,
    },
    Chat { from: PeerId, data: Value },
    NcStatus { from: PeerId, enabled: bool },
    FileIncoming { from: PeerId, metadata: FileMetadata },
    FileReceived {
        from: PeerId,
        metadata: FileMetadata,
        bytes: Vec<u8>,
    },
    FileFailed {
        from: PeerId,
        name: String,
        reason: String,
    },
    /// In-band error frame from the coordinator (room full, not found).
    SignalingError { error: String },
}
