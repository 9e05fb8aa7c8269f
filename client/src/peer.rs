//! WebRTC engine capability seam.
//!
//! The session engine depends only on these traits; the host platform (a
//! browser binding, `webrtc-rs`, or a test double) implements them and posts
//! [`PeerEvent`]s into the driver loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tandem_common::IceServer;

/// Peer connection capability errors.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("SDP error: {0}")]
    Sdp(String),

    #[error("ICE error: {0}")]
    Ice(String),

    #[error("No peer connection")]
    NotConnected,
}

/// Which ICE transports a peer connection may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPolicy {
    /// Host, server-reflexive, and relay candidates.
    All,
    /// Relay candidates only.
    Relay,
}

/// SDP kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A session description, serialized on the wire as `{type, sdp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

/// ICE connection states the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// ICE gathering states; any transition counts as ICE activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    New,
    Gathering,
    Complete,
}

/// Candidate type of one end of a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Host,
    Srflx,
    Prflx,
    Relay,
}

impl CandidateKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Srflx => "srflx",
            Self::Prflx => "prflx",
            Self::Relay => "relay",
        }
    }
}

/// Candidate pair check state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Frozen,
    Waiting,
    InProgress,
    Succeeded,
    Failed,
}

/// One end of a candidate pair, resolved from the stats report.
#[derive(Debug, Clone)]
pub struct CandidateEndpoint {
    pub kind: CandidateKind,
    pub address: Option<String>,
}

/// A candidate pair from the engine's stats.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub selected: bool,
    pub nominated: bool,
    pub state: PairState,
    pub local: CandidateEndpoint,
    pub remote: CandidateEndpoint,
}

/// Events the host's WebRTC engine posts into the session driver.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A local ICE candidate was gathered (candidate-init JSON).
    IceCandidate(serde_json::Value),
    /// The ICE connection state changed.
    IceConnectionState(IceConnectionState),
    /// The ICE gathering state changed.
    IceGatheringState(GatheringState),
}

/// Configuration for building a peer connection.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub ice_servers: Vec<IceServer>,
    pub policy: TransportPolicy,
}

/// One live peer connection.
#[async_trait]
pub trait PeerHandle: Send {
    async fn create_offer(&mut self) -> Result<SessionDescription, PeerError>;

    async fn create_answer(&mut self) -> Result<SessionDescription, PeerError>;

    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<(), PeerError>;

    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<(), PeerError>;

    /// Apply a remote candidate-init. Callers must only invoke this after
    /// the remote description is set.
    async fn add_ice_candidate(&mut self, candidate: serde_json::Value) -> Result<(), PeerError>;

    /// Candidate-pair stats snapshot for mode detection.
    async fn candidate_pairs(&mut self) -> Result<Vec<CandidatePair>, PeerError>;

    /// Attach or mute the local audio track.
    async fn set_voice_enabled(&mut self, enabled: bool) -> Result<(), PeerError>;

    async fn close(&mut self);
}

/// Factory for peer connections; fallback and hard reset rebuild through it.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, config: PeerConfig) -> Result<Box<dyn PeerHandle>, PeerError>;
}
