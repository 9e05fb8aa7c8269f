//! Session State Machine
//!
//! Drives one two-party call: `Connecting → PrimaryAttempt → {Connected |
//! RelayFallback → Connected} → HardReset`. The engine is single-threaded
//! cooperative — the driver task feeds it signaling frames, WebRTC engine
//! events, UI commands, and time, and is the only place state mutates.
//!
//! Timers are explicit deadline fields consumed through
//! [`SessionEngine::next_deadline`] / [`SessionEngine::on_tick`] so the
//! driver owns a single sleep and tests can drive time synthetically.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tandem_common::{
    ClientFrame, ConnectionMode, FileMetadata, NcStatus, PeerId, Role, RoomCode, ServerFrame,
    SessionId, TurnConfig,
};

use crate::error::SessionError;
use crate::events::{ConnectionDetails, SessionEvent, SessionStatus};
use crate::file::FileReassembly;
use crate::mode;
use crate::peer::{
    IceConnectionState, PeerConfig, PeerConnector, PeerEvent, PeerHandle, SessionDescription,
    TransportPolicy,
};
use crate::transport::SignalSender;

/// Grace period in the `disconnected` ICE state before relay fallback.
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(12);

/// Single retry delay when mode detection finds no usable candidate pair.
pub const MODE_PROBE_RETRY: Duration = Duration::from_millis(300);

/// Keepalive ping period on the signaling stream.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(20);

/// Connection phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Signaling stream opening or no remote peer yet.
    Connecting,
    /// Remote peer present; first connection attempt with all transports.
    PrimaryAttempt,
    /// Controller-driven relay-only rebuild in progress.
    RelayFallback,
    /// ICE reached connected/completed.
    Connected,
}

/// Static parameters for one engine instance.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub room_id: RoomCode,
    pub peer_id: PeerId,
    pub nickname: String,
    pub turn: TurnConfig,
}

/// The per-peer session state machine.
pub struct SessionEngine {
    cfg: SessionConfig,
    connector: Arc<dyn PeerConnector>,
    signal: Arc<dyn SignalSender>,
    events: mpsc::UnboundedSender<SessionEvent>,

    // Identity
    session_id: SessionId,
    role: Option<Role>,
    remote_peer: Option<PeerId>,
    remote_session_id: Option<SessionId>,
    stream_open: bool,
    joined: bool,
    /// The current session id has been presented to the coordinator; any
    /// later re-open must mint a new one.
    session_used: bool,

    // Connection state
    phase: Phase,
    status: SessionStatus,
    mode: Option<ConnectionMode>,
    mode_locked: bool,
    fallback_triggered: bool,
    connection_established: bool,
    policy: TransportPolicy,

    pc: Option<Box<dyn PeerHandle>>,
    remote_description_set: bool,
    pending_remote_candidates: Vec<Value>,
    pending_local_candidates: Vec<Value>,

    // Negotiation guard: at most one outstanding offer.
    offer_in_flight: bool,
    voice_enabled: bool,
    pending_voice: bool,
    pending_stop: bool,

    // Deadlines
    disconnect_deadline: Option<Instant>,
    mode_probe_at: Option<Instant>,
    mode_probe_retried: bool,
    heartbeat_at: Option<Instant>,

    // Inbound file transfer
    inbound_file: Option<(PeerId, FileReassembly)>,
}

impl SessionEngine {
    /// Create an engine with a fresh session id. Returns the UI event
    /// stream alongside it.
    pub fn new(
        cfg: SessionConfig,
        connector: Arc<dyn PeerConnector>,
        signal: Arc<dyn SignalSender>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let engine = Self {
            cfg,
            connector,
            signal,
            events,
            session_id: SessionId::new(),
            role: None,
            remote_peer: None,
            remote_session_id: None,
            stream_open: false,
            joined: false,
            session_used: false,
            phase: Phase::Connecting,
            status: SessionStatus::Connecting,
            mode: None,
            mode_locked: false,
            fallback_triggered: false,
            connection_established: false,
            policy: TransportPolicy::All,
            pc: None,
            remote_description_set: false,
            pending_remote_candidates: Vec::new(),
            pending_local_candidates: Vec::new(),
            offer_in_flight: false,
            voice_enabled: false,
            pending_voice: false,
            pending_stop: false,
            disconnect_deadline: None,
            mode_probe_at: None,
            mode_probe_retried: false,
            heartbeat_at: None,
            inbound_file: None,
        };
        (engine, event_rx)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn mode(&self) -> Option<ConnectionMode> {
        self.mode
    }

    pub fn is_mode_locked(&self) -> bool {
        self.mode_locked
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Earliest pending deadline, for the driver's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.heartbeat_at, self.disconnect_deadline, self.mode_probe_at]
            .into_iter()
            .flatten()
            .min()
    }

    // ------------------------------------------------------------------
    // Transport lifecycle
    // ------------------------------------------------------------------

    /// The signaling stream (re)opened: join the room. A re-open after a
    /// previous join is a new incarnation and gets a fresh session id.
    pub async fn on_transport_open(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.session_used {
            self.hard_reset().await?;
            self.session_id = SessionId::new();
            info!(session_id = %self.session_id, "Signaling stream reopened, new session");
        }
        self.stream_open = true;
        self.joined = false;
        self.session_used = true;
        self.heartbeat_at = Some(now + HEARTBEAT_PERIOD);
        self.send(ClientFrame::Join {
            room_id: self.cfg.room_id.clone(),
            peer_id: self.cfg.peer_id.clone(),
            nickname: self.cfg.nickname.clone(),
            session_id: self.session_id,
        });
        Ok(())
    }

    /// The signaling stream dropped; the transport is already reconnecting.
    pub fn on_transport_closed(&mut self) {
        self.stream_open = false;
        self.joined = false;
        self.heartbeat_at = None;
    }

    // ------------------------------------------------------------------
    // Inbound signaling frames
    // ------------------------------------------------------------------

    /// Handle one frame from the coordinator. The stale-session filter runs
    /// before any side effect.
    pub async fn handle_frame(&mut self, frame: ServerFrame) -> Result<(), SessionError> {
        if self.is_stale(&frame) {
            debug!(frame = ?frame, "Discarding stale frame");
            return Ok(());
        }

        match frame {
            ServerFrame::Joined {
                role,
                existing_peers,
            } => {
                self.joined = true;
                self.role = Some(role);
                self.emit(SessionEvent::Joined { role });
                info!(role = ?role, session_id = %self.session_id, "Joined room");

                for candidate in std::mem::take(&mut self.pending_local_candidates) {
                    self.send(ClientFrame::IceCandidate {
                        session_id: self.session_id,
                        data: candidate,
                    });
                }

                if let Some(peer) = existing_peers.into_iter().next() {
                    self.adopt_remote(peer.peer_id.clone(), peer.session_id);
                    self.emit(SessionEvent::PeerJoined {
                        peer_id: peer.peer_id,
                        nickname: peer.nickname,
                    });
                    self.enter_primary_attempt().await?;
                }
            }

            ServerFrame::PeerJoined {
                peer_id,
                nickname,
                session_id,
            } => {
                if self.remote_session_id.is_some() {
                    // A refreshed incarnation of the peer replaced the old
                    // membership without an intervening peer-left.
                    self.hard_reset().await?;
                }
                self.adopt_remote(peer_id.clone(), session_id);
                self.emit(SessionEvent::PeerJoined { peer_id, nickname });
                self.enter_primary_attempt().await?;
            }

            ServerFrame::RoleUpdate { role } => {
                self.role = Some(role);
                self.emit(SessionEvent::RoleUpdated { role });
                info!(role = ?role, "Role updated");
            }

            ServerFrame::Offer { data, .. } => self.handle_offer(data).await?,

            ServerFrame::Answer { data, .. } => self.handle_answer(data).await?,

            ServerFrame::IceCandidate { data, .. } => {
                if self.remote_description_set {
                    if let Some(pc) = self.pc.as_mut() {
                        pc.add_ice_candidate(data).await?;
                    }
                } else {
                    self.pending_remote_candidates.push(data);
                }
            }

            ServerFrame::Chat { from, data, .. } => {
                self.emit(SessionEvent::Chat { from, data });
            }

            ServerFrame::FileMetadata { from, data, .. } => {
                self.emit(SessionEvent::FileIncoming {
                    from: from.clone(),
                    metadata: data.clone(),
                });
                self.inbound_file = Some((from, FileReassembly::new(data)));
            }

            ServerFrame::FileChunk { data, .. } => {
                let failed = match self.inbound_file.as_mut() {
                    Some((from, reassembly)) => match reassembly.push_chunk(&data) {
                        Ok(()) => None,
                        Err(e) => Some((
                            from.clone(),
                            reassembly.metadata().name.clone(),
                            e.to_string(),
                        )),
                    },
                    None => {
                        debug!("Dropping file chunk without metadata");
                        None
                    }
                };
                if let Some((from, name, reason)) = failed {
                    self.inbound_file = None;
                    self.emit(SessionEvent::FileFailed { from, name, reason });
                }
            }

            ServerFrame::FileEof { .. } => {
                if let Some((from, reassembly)) = self.inbound_file.take() {
                    let name = reassembly.metadata().name.clone();
                    match reassembly.finish() {
                        Ok((metadata, bytes)) => self.emit(SessionEvent::FileReceived {
                            from,
                            metadata,
                            bytes,
                        }),
                        Err(e) => self.emit(SessionEvent::FileFailed {
                            from,
                            name,
                            reason: e.to_string(),
                        }),
                    }
                }
            }

            ServerFrame::NcStatus { from, data, .. } => {
                self.emit(SessionEvent::NcStatus {
                    from,
                    enabled: data.enabled,
                });
            }

            ServerFrame::RelayRestart { .. } => {
                // Controller ordered a relay-only rebuild; it will re-offer.
                info!("Relay restart requested by controller");
                self.phase = Phase::RelayFallback;
                self.fallback_triggered = true;
                self.disconnect_deadline = None;
                self.rebuild_connection(TransportPolicy::Relay).await?;
            }

            ServerFrame::ConnectionMode { mode, .. } => {
                if !self.mode_locked {
                    self.lock_mode(mode, None);
                }
            }

            ServerFrame::PeerLeft { peer_id, .. } => {
                info!(peer_id = %peer_id, "Peer left");
                self.emit(SessionEvent::PeerLeft { peer_id });
                self.hard_reset().await?;
            }

            ServerFrame::SessionEnd { .. } => {
                info!("Session ended by peer");
                self.emit(SessionEvent::SessionEnded);
                self.hard_reset().await?;
            }

            ServerFrame::Error { error } => {
                warn!(error = %error, "Coordinator error frame");
                self.emit(SessionEvent::SignalingError { error });
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // WebRTC engine events
    // ------------------------------------------------------------------

    /// Handle one event from the host's WebRTC engine.
    pub async fn handle_peer_event(
        &mut self,
        event: PeerEvent,
        now: Instant,
    ) -> Result<(), SessionError> {
        match event {
            PeerEvent::IceCandidate(candidate) => {
                self.touch_ice_activity(now);
                if self.stream_open && self.joined {
                    self.send(ClientFrame::IceCandidate {
                        session_id: self.session_id,
                        data: candidate,
                    });
                } else {
                    self.pending_local_candidates.push(candidate);
                }
            }
            PeerEvent::IceGatheringState(_) => self.touch_ice_activity(now),
            PeerEvent::IceConnectionState(state) => self.on_ice_state(state, now).await?,
        }
        Ok(())
    }

    async fn on_ice_state(
        &mut self,
        state: IceConnectionState,
        now: Instant,
    ) -> Result<(), SessionError> {
        debug!(state = ?state, "ICE connection state");

        if state != IceConnectionState::Disconnected {
            self.disconnect_deadline = None;
        }

        match state {
            IceConnectionState::Connected | IceConnectionState::Completed => {
                if !self.connection_established {
                    self.connection_established = true;
                    self.phase = Phase::Connected;
                }
                self.set_status(SessionStatus::Connected);
                if self.role == Some(Role::Controller) && !self.mode_locked {
                    self.mode_probe_retried = false;
                    self.mode_probe_at = None;
                    self.detect_mode(now).await?;
                }
            }

            IceConnectionState::Disconnected => {
                if self.mode_locked {
                    self.set_status(SessionStatus::Reconnecting);
                } else if self.role == Some(Role::Controller)
                    && self.fallback_allowed()
                    && self.disconnect_deadline.is_none()
                {
                    self.disconnect_deadline = Some(now + DISCONNECT_GRACE);
                }
            }

            IceConnectionState::Failed => {
                if self.role == Some(Role::Controller) && self.fallback_allowed() {
                    self.trigger_fallback().await?;
                } else if self.mode_locked {
                    // No recovery within the session; the peer-left path
                    // will end it.
                    self.set_status(SessionStatus::Reconnecting);
                }
            }

            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Fire any deadline that has passed.
    pub async fn on_tick(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.heartbeat_at.is_some_and(|at| at <= now) {
            self.heartbeat_at = Some(now + HEARTBEAT_PERIOD);
            if self.stream_open {
                self.send(ClientFrame::Ping {
                    session_id: self.session_id,
                });
            }
        }

        if self.disconnect_deadline.is_some_and(|at| at <= now) {
            self.disconnect_deadline = None;
            info!("Disconnected grace expired");
            if self.role == Some(Role::Controller) && self.fallback_allowed() {
                self.trigger_fallback().await?;
            }
        }

        if self.mode_probe_at.is_some_and(|at| at <= now) {
            self.mode_probe_at = None;
            self.detect_mode(now).await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // UI commands
    // ------------------------------------------------------------------

    /// Relay a chat payload verbatim.
    pub fn send_chat(&self, data: Value) {
        self.send(ClientFrame::Chat {
            session_id: self.session_id,
            data,
        });
    }

    /// Announce the local noise-cancellation state.
    pub fn set_nc_enabled(&self, enabled: bool) {
        self.send(ClientFrame::NcStatus {
            session_id: self.session_id,
            data: NcStatus { enabled },
        });
    }

    /// Send a file: metadata, fixed-size base64 chunks, then eof.
    pub fn send_file(&self, name: &str, mime: &str, bytes: &[u8]) {
        self.send(ClientFrame::FileMetadata {
            session_id: self.session_id,
            data: FileMetadata {
                name: name.to_string(),
                size: bytes.len() as u64,
                mime: mime.to_string(),
                from: None,
                from_nickname: None,
            },
        });
        for chunk in crate::file::encode_chunks(bytes) {
            self.send(ClientFrame::FileChunk {
                session_id: self.session_id,
                data: chunk,
            });
        }
        self.send(ClientFrame::FileEof {
            session_id: self.session_id,
            data: None,
        });
    }

    /// Attach the local audio track, renegotiating. Deferred while an offer
    /// is already in flight.
    pub async fn start_voice(&mut self) -> Result<(), SessionError> {
        if self.offer_in_flight {
            self.pending_voice = true;
            return Ok(());
        }
        self.apply_voice(true).await
    }

    /// Detach the local audio track. Deferred while negotiating.
    pub async fn stop_voice(&mut self) -> Result<(), SessionError> {
        if self.offer_in_flight {
            self.pending_stop = true;
            return Ok(());
        }
        self.apply_voice(false).await
    }

    /// Hang up: notify the coordinator and reset for a possible new peer.
    pub async fn end_session(&mut self) -> Result<(), SessionError> {
        self.send(ClientFrame::EndSession {
            session_id: self.session_id,
        });
        self.emit(SessionEvent::SessionEnded);
        self.hard_reset().await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Stale-event filter (applied before any state transition).
    ///
    /// A frame about this peer from another incarnation, or a remote-origin
    /// frame whose session id does not match the captured remote session,
    /// is dropped without side effects. This is what makes a page refresh a
    /// clean new session.
    fn is_stale(&self, frame: &ServerFrame) -> bool {
        match frame {
            ServerFrame::PeerLeft {
                peer_id,
                session_id,
            } => {
                if *peer_id == self.cfg.peer_id {
                    *session_id != self.session_id
                } else {
                    self.remote_session_id != Some(*session_id)
                }
            }
            other => remote_origin_session(other)
                .is_some_and(|sid| self.remote_session_id != Some(sid)),
        }
    }

    fn adopt_remote(&mut self, peer_id: PeerId, session_id: SessionId) {
        self.remote_peer = Some(peer_id);
        self.remote_session_id = Some(session_id);
    }

    const fn fallback_allowed(&self) -> bool {
        !self.mode_locked && !self.fallback_triggered && !self.connection_established
    }

    fn touch_ice_activity(&mut self, now: Instant) {
        if self.disconnect_deadline.is_some() {
            self.disconnect_deadline = Some(now + DISCONNECT_GRACE);
        }
    }

    async fn enter_primary_attempt(&mut self) -> Result<(), SessionError> {
        self.phase = Phase::PrimaryAttempt;

        let reusable = self.pc.is_some()
            && self.policy == TransportPolicy::All
            && !self.remote_description_set
            && !self.offer_in_flight;
        if !reusable {
            self.rebuild_connection(TransportPolicy::All).await?;
        }

        // The follower opens negotiation; the controller waits for the offer.
        if self.role == Some(Role::Follower) {
            self.send_offer().await?;
        }
        Ok(())
    }

    async fn handle_offer(&mut self, data: Value) -> Result<(), SessionError> {
        let desc: SessionDescription = serde_json::from_value(data)?;
        if self.pc.is_none() {
            self.rebuild_connection(self.policy).await?;
        }

        let buffered = std::mem::take(&mut self.pending_remote_candidates);
        let answer = {
            let pc = self.pc.as_mut().expect("connection ensured above");
            pc.set_remote_description(desc).await?;
            for candidate in buffered {
                pc.add_ice_candidate(candidate).await?;
            }
            let answer = pc.create_answer().await?;
            pc.set_local_description(answer.clone()).await?;
            answer
        };
        self.remote_description_set = true;

        self.send(ClientFrame::Answer {
            session_id: self.session_id,
            data: serde_json::to_value(&answer)?,
        });
        Ok(())
    }

    async fn handle_answer(&mut self, data: Value) -> Result<(), SessionError> {
        let desc: SessionDescription = serde_json::from_value(data)?;
        let buffered = std::mem::take(&mut self.pending_remote_candidates);
        if let Some(pc) = self.pc.as_mut() {
            pc.set_remote_description(desc).await?;
            for candidate in buffered {
                pc.add_ice_candidate(candidate).await?;
            }
        }
        self.remote_description_set = true;
        self.offer_in_flight = false;

        // Deferred negotiation work now that signaling is stable again.
        if self.pending_stop {
            self.pending_stop = false;
            self.pending_voice = false;
            self.apply_voice(false).await?;
        } else if self.pending_voice {
            self.pending_voice = false;
            self.apply_voice(true).await?;
        }
        Ok(())
    }

    async fn apply_voice(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.voice_enabled = enabled;
        if self.pc.is_none() {
            return Ok(());
        }
        if let Some(pc) = self.pc.as_mut() {
            pc.set_voice_enabled(enabled).await?;
        }
        // Renegotiate so the track change reaches the peer.
        if self.remote_peer.is_some() {
            self.send_offer().await?;
        }
        Ok(())
    }

    async fn send_offer(&mut self) -> Result<(), SessionError> {
        let offer = match self.pc.as_mut() {
            Some(pc) => {
                let offer = pc.create_offer().await?;
                pc.set_local_description(offer.clone()).await?;
                offer
            }
            None => return Ok(()),
        };
        self.offer_in_flight = true;
        self.send(ClientFrame::Offer {
            session_id: self.session_id,
            data: serde_json::to_value(&offer)?,
        });
        Ok(())
    }

    async fn detect_mode(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.mode_locked {
            return Ok(());
        }
        let pairs = match self.pc.as_mut() {
            Some(pc) => pc.candidate_pairs().await?,
            None => return Ok(()),
        };

        if let Some(pair) = mode::select_pair(&pairs) {
            let detected = mode::classify(pair);
            let details = mode::details(pair);
            self.lock_mode(detected, Some(details));
            self.send(ClientFrame::ConnectionMode {
                session_id: self.session_id,
                mode: detected,
            });
        } else if self.mode_probe_retried {
            debug!("Mode detection found no candidate pair after retry");
        } else {
            self.mode_probe_retried = true;
            self.mode_probe_at = Some(now + MODE_PROBE_RETRY);
        }
        Ok(())
    }

    fn lock_mode(&mut self, detected: ConnectionMode, details: Option<ConnectionDetails>) {
        if self.mode_locked {
            return;
        }
        self.mode = Some(detected);
        self.mode_locked = true;
        self.disconnect_deadline = None;
        self.mode_probe_at = None;
        info!(mode = ?detected, "Connection mode locked");
        self.emit(SessionEvent::ModeLocked {
            mode: detected,
            details,
        });
    }

    async fn trigger_fallback(&mut self) -> Result<(), SessionError> {
        if self.role != Some(Role::Controller) || !self.fallback_allowed() {
            return Ok(());
        }
        info!("Primary attempt failed, falling back to relay");
        self.fallback_triggered = true;
        self.phase = Phase::RelayFallback;
        self.disconnect_deadline = None;

        self.send(ClientFrame::RelayRestart {
            session_id: self.session_id,
        });
        self.rebuild_connection(TransportPolicy::Relay).await?;
        self.send_offer().await?;
        Ok(())
    }

    /// Tear down and rebuild the peer connection, keeping local tracks.
    async fn rebuild_connection(&mut self, policy: TransportPolicy) -> Result<(), SessionError> {
        if let Some(mut pc) = self.pc.take() {
            pc.close().await;
        }

        let ice_servers = match policy {
            TransportPolicy::All => self.cfg.turn.ice_servers(),
            TransportPolicy::Relay => self.cfg.turn.relay_servers(),
        };
        let mut pc = self
            .connector
            .connect(PeerConfig {
                ice_servers,
                policy,
            })
            .await?;
        if self.voice_enabled {
            pc.set_voice_enabled(true).await?;
        }

        self.policy = policy;
        self.remote_description_set = false;
        self.pending_remote_candidates.clear();
        self.offer_in_flight = false;
        self.pc = Some(pc);
        Ok(())
    }

    /// Full reset after peer loss: clear everything scoped to the remote
    /// incarnation and rebuild with all transports, awaiting a new
    /// `peer-joined`.
    async fn hard_reset(&mut self) -> Result<(), SessionError> {
        self.disconnect_deadline = None;
        self.mode_probe_at = None;
        self.mode_probe_retried = false;
        self.mode = None;
        self.mode_locked = false;
        self.fallback_triggered = false;
        self.connection_established = false;
        self.pending_voice = false;
        self.pending_stop = false;
        self.pending_local_candidates.clear();
        self.remote_peer = None;
        self.remote_session_id = None;
        self.inbound_file = None;
        self.phase = Phase::Connecting;

        self.rebuild_connection(TransportPolicy::All).await?;
        self.set_status(SessionStatus::Connecting);
        Ok(())
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            self.status = status;
            self.emit(SessionEvent::StatusChanged(status));
        }
    }

    fn send(&self, frame: ClientFrame) {
        if let Err(e) = self.signal.send(frame) {
            warn!(error = %e, "Failed to enqueue signaling frame");
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Session id of a remote-origin frame, for the stale filter. Server-origin
/// lifecycle frames (`joined`, `peer-joined`, `role-update`, `error`) are
/// not filtered; `peer-left` has its own rule.
const fn remote_origin_session(frame: &ServerFrame) -> Option<SessionId> {
    match frame {
        ServerFrame::Offer { session_id, .. }
        | ServerFrame::Answer { session_id, .. }
        | ServerFrame::IceCandidate { session_id, .. }
        | ServerFrame::Chat { session_id, .. }
        | ServerFrame::FileMetadata { session_id, .. }
        | ServerFrame::FileChunk { session_id, .. }
        | ServerFrame::FileEof { session_id, .. }
        | ServerFrame::NcStatus { session_id, .. }
        | ServerFrame::RelayRestart { session_id, .. }
        | ServerFrame::ConnectionMode { session_id, .. }
        | ServerFrame::SessionEnd { session_id } => Some(*session_id),
        ServerFrame::Joined { .. }
        | ServerFrame::PeerJoined { .. }
        | ServerFrame::RoleUpdate { .. }
        | ServerFrame::PeerLeft { .. }
        | ServerFrame::Error { .. } => None,
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
