//! Tandem Client
//!
//! The session state machine that drives one two-party WebRTC call: role-
//! gated offer/answer flow, P2P→relay fallback, session-scoped frame
//! filtering, and hard-reset semantics on peer loss.
//!
//! The host platform supplies the actual WebRTC engine and event loop
//! through the [`peer`] capability traits; this crate never touches browser
//! or native media APIs directly.

pub mod driver;
pub mod error;
pub mod events;
pub mod file;
pub mod mode;
pub mod peer;
pub mod probe;
pub mod session;
pub mod transport;

pub use driver::{Command, SessionHandle};
pub use error::SessionError;
pub use events::{ConnectionDetails, SessionEvent, SessionStatus};
pub use peer::{
    CandidateEndpoint, CandidateKind, CandidatePair, GatheringState, IceConnectionState,
    PairState, PeerConfig, PeerConnector, PeerError, PeerEvent, PeerHandle, SdpKind,
    SessionDescription, TransportPolicy,
};
pub use session::{Phase, SessionConfig, SessionEngine};
pub use transport::{SignalSender, TransportEvent, WsTransport};
