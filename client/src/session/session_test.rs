//! Session state machine tests with mock connector and transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use tandem_common::{
    ClientFrame, ConnectionMode, FileMetadata, PeerId, PeerInfo, Role, RoomCode, ServerFrame,
    SessionId, TurnConfig,
};

use crate::error::SessionError;
use crate::events::{SessionEvent, SessionStatus};
use crate::file::encode_chunks;
use crate::peer::{
    CandidateEndpoint, CandidateKind, CandidatePair, IceConnectionState, PairState, PeerConfig,
    PeerConnector, PeerError, PeerHandle, SdpKind, SessionDescription, TransportPolicy,
};
use crate::session::{Phase, SessionConfig, SessionEngine, DISCONNECT_GRACE, MODE_PROBE_RETRY};
use crate::transport::SignalSender;

// ----------------------------------------------------------------------
// Mock capabilities
// ----------------------------------------------------------------------

#[derive(Default)]
struct SignalLog {
    frames: Mutex<Vec<ClientFrame>>,
}

struct FakeSignal(Arc<SignalLog>);

impl SignalSender for FakeSignal {
    fn send(&self, frame: ClientFrame) -> Result<(), SessionError> {
        self.0.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {}
}

#[derive(Default)]
struct PeerLog {
    /// One entry per `connect()` call.
    policies: Mutex<Vec<TransportPolicy>>,
    /// Flattened operation log across all handles.
    ops: Mutex<Vec<String>>,
    /// What `candidate_pairs()` returns.
    pairs: Mutex<Vec<CandidatePair>>,
}

impl PeerLog {
    fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn op_count(&self, op: &str) -> usize {
        self.ops.lock().unwrap().iter().filter(|o| *o == op).count()
    }

    fn set_pairs(&self, pairs: Vec<CandidatePair>) {
        *self.pairs.lock().unwrap() = pairs;
    }
}

struct FakeConnector {
    log: Arc<PeerLog>,
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(&self, config: PeerConfig) -> Result<Box<dyn PeerHandle>, PeerError> {
        self.log.policies.lock().unwrap().push(config.policy);
        Ok(Box::new(FakePeer {
            log: self.log.clone(),
        }))
    }
}

struct FakePeer {
    log: Arc<PeerLog>,
}

impl FakePeer {
    fn record(&self, op: &str) {
        self.log.ops.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl PeerHandle for FakePeer {
    async fn create_offer(&mut self) -> Result<SessionDescription, PeerError> {
        self.record("create_offer");
        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: "v=0 offer".into(),
        })
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, PeerError> {
        self.record("create_answer");
        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: "v=0 answer".into(),
        })
    }

    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<(), PeerError> {
        self.record(match desc.kind {
            SdpKind::Offer => "set_local:offer",
            SdpKind::Answer => "set_local:answer",
        });
        Ok(())
    }

    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<(), PeerError> {
        self.record(match desc.kind {
            SdpKind::Offer => "set_remote:offer",
            SdpKind::Answer => "set_remote:answer",
        });
        Ok(())
    }

    async fn add_ice_candidate(&mut self, _candidate: Value) -> Result<(), PeerError> {
        self.record("add_candidate");
        Ok(())
    }

    async fn candidate_pairs(&mut self) -> Result<Vec<CandidatePair>, PeerError> {
        self.record("candidate_pairs");
        Ok(self.log.pairs.lock().unwrap().clone())
    }

    async fn set_voice_enabled(&mut self, enabled: bool) -> Result<(), PeerError> {
        self.record(if enabled { "voice:on" } else { "voice:off" });
        Ok(())
    }

    async fn close(&mut self) {
        self.record("close");
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

struct Harness {
    engine: SessionEngine,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    signals: Arc<SignalLog>,
    peers: Arc<PeerLog>,
    remote_session: SessionId,
}

fn harness() -> Harness {
    let signals = Arc::new(SignalLog::default());
    let peers = Arc::new(PeerLog::default());
    let cfg = SessionConfig {
        room_id: RoomCode::parse("A1B2C3").unwrap(),
        peer_id: PeerId::from("me"),
        nickname: "alice".into(),
        turn: TurnConfig {
            urls: vec!["turn:t.example:3478".into()],
            username: "u".into(),
            credential: "c".into(),
            stun_urls: Some(vec!["stun:s.example:3478".into()]),
        },
    };
    let (engine, events) = SessionEngine::new(
        cfg,
        Arc::new(FakeConnector { log: peers.clone() }),
        Arc::new(FakeSignal(signals.clone())),
    );
    Harness {
        engine,
        events,
        signals,
        peers,
        remote_session: SessionId::new(),
    }
}

impl Harness {
    fn sent(&self) -> Vec<ClientFrame> {
        self.signals.frames.lock().unwrap().clone()
    }

    fn sent_tags(&self) -> Vec<&'static str> {
        self.sent().iter().map(frame_tag).collect()
    }

    fn count_sent(&self, tag: &str) -> usize {
        self.sent_tags().iter().filter(|t| **t == tag).count()
    }

    fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn policies(&self) -> Vec<TransportPolicy> {
        self.peers.policies.lock().unwrap().clone()
    }

    /// Open the transport and join as the follower of an existing peer.
    async fn join_as_follower(&mut self, now: Instant) {
        self.engine.on_transport_open(now).await.unwrap();
        self.engine
            .handle_frame(ServerFrame::Joined {
                role: Role::Follower,
                existing_peers: vec![PeerInfo {
                    peer_id: PeerId::from("p1"),
                    nickname: "bob".into(),
                    session_id: self.remote_session,
                }],
            })
            .await
            .unwrap();
    }

    /// Open the transport, join as controller, then see a peer arrive.
    async fn join_as_controller(&mut self, now: Instant) {
        self.engine.on_transport_open(now).await.unwrap();
        self.engine
            .handle_frame(ServerFrame::Joined {
                role: Role::Controller,
                existing_peers: vec![],
            })
            .await
            .unwrap();
        self.engine
            .handle_frame(ServerFrame::PeerJoined {
                peer_id: PeerId::from("p2"),
                nickname: "bob".into(),
                session_id: self.remote_session,
            })
            .await
            .unwrap();
    }
}

fn frame_tag(frame: &ClientFrame) -> &'static str {
    match frame {
        ClientFrame::Join { .. } => "join",
        ClientFrame::Offer { .. } => "offer",
        ClientFrame::Answer { .. } => "answer",
        ClientFrame::IceCandidate { .. } => "ice-candidate",
        ClientFrame::Chat { .. } => "chat",
        ClientFrame::FileMetadata { .. } => "file-metadata",
        ClientFrame::FileChunk { .. } => "file-chunk",
        ClientFrame::FileEof { .. } => "file-eof",
        ClientFrame::NcStatus { .. } => "nc-status",
        ClientFrame::RelayRestart { .. } => "relay-restart",
        ClientFrame::ConnectionMode { .. } => "connection-mode",
        ClientFrame::EndSession { .. } => "end-session",
        ClientFrame::Ping { .. } => "ping",
    }
}

fn sdp(kind: &str) -> Value {
    json!({ "type": kind, "sdp": format!("v=0 {kind}") })
}

fn candidate(n: u32) -> Value {
    json!({ "candidate": format!("candidate:{n} 1 UDP 1 192.0.2.{n} 5000 typ srflx"), "sdpMid": "0" })
}

fn pair(local: CandidateKind, remote: CandidateKind) -> CandidatePair {
    CandidatePair {
        selected: true,
        nominated: true,
        state: PairState::Succeeded,
        local: CandidateEndpoint {
            kind: local,
            address: Some("192.0.2.1:5000".into()),
        },
        remote: CandidateEndpoint {
            kind: remote,
            address: Some("198.51.100.2:6000".into()),
        },
    }
}

fn offer_from(peer: &str, session: SessionId) -> ServerFrame {
    ServerFrame::Offer {
        from: PeerId::from(peer),
        session_id: session,
        data: sdp("offer"),
    }
}

fn answer_from(peer: &str, session: SessionId) -> ServerFrame {
    ServerFrame::Answer {
        from: PeerId::from(peer),
        session_id: session,
        data: sdp("answer"),
    }
}

fn ice_from(peer: &str, session: SessionId, n: u32) -> ServerFrame {
    ServerFrame::IceCandidate {
        from: PeerId::from(peer),
        session_id: session,
        data: candidate(n),
    }
}

// ----------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------

#[tokio::test]
async fn follower_offers_after_role_assignment() {
    let mut h = harness();
    h.join_as_follower(Instant::now()).await;

    // Role arrives before any outbound SDP, then the follower opens
    // negotiation with all transports allowed.
    assert_eq!(h.sent_tags(), vec!["join", "offer"]);
    assert_eq!(h.policies(), vec![TransportPolicy::All]);
    let ops = h.peers.ops();
    let offer_at = ops.iter().position(|o| o == "create_offer").unwrap();
    assert_eq!(ops[offer_at + 1], "set_local:offer");

    let events = h.drain_events();
    assert!(matches!(events[0], SessionEvent::Joined { role: Role::Follower }));
}

#[tokio::test]
async fn controller_buffers_candidates_until_remote_description() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_controller(Instant::now()).await;

    // Candidate arrives 20 ms early: buffered, not applied.
    h.engine.handle_frame(ice_from("p2", rs, 1)).await.unwrap();
    assert_eq!(h.peers.op_count("add_candidate"), 0);

    // Offer processed: remote description first, then the buffered
    // candidate exactly once, then the answer.
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();
    let ops = h.peers.ops();
    let remote_at = ops.iter().position(|o| o == "set_remote:offer").unwrap();
    let candidate_at = ops.iter().position(|o| o == "add_candidate").unwrap();
    let answer_at = ops.iter().position(|o| o == "create_answer").unwrap();
    assert!(remote_at < candidate_at && candidate_at < answer_at);
    assert_eq!(h.peers.op_count("add_candidate"), 1);
    assert_eq!(h.count_sent("answer"), 1);

    // Later candidates apply immediately.
    h.engine.handle_frame(ice_from("p2", rs, 2)).await.unwrap();
    assert_eq!(h.peers.op_count("add_candidate"), 2);
}

#[tokio::test]
async fn stale_session_frames_are_discarded() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_controller(Instant::now()).await;
    h.drain_events();
    let builds_before = h.policies().len();

    let stale = SessionId::new();

    // Stale candidate from a previous incarnation of the peer.
    h.engine.handle_frame(ice_from("p2", stale, 1)).await.unwrap();
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();
    assert_eq!(h.peers.op_count("add_candidate"), 0);

    // Stale peer-left about the remote: the session survives.
    h.engine
        .handle_frame(ServerFrame::PeerLeft {
            peer_id: PeerId::from("p2"),
            session_id: stale,
        })
        .await
        .unwrap();
    // Stale peer-left about ourselves: same.
    h.engine
        .handle_frame(ServerFrame::PeerLeft {
            peer_id: PeerId::from("me"),
            session_id: stale,
        })
        .await
        .unwrap();
    assert!(h.drain_events().is_empty());
    assert_eq!(h.policies().len(), builds_before);

    // The genuine peer-left tears the session down.
    h.engine
        .handle_frame(ServerFrame::PeerLeft {
            peer_id: PeerId::from("p2"),
            session_id: rs,
        })
        .await
        .unwrap();
    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::PeerLeft { .. })));
    assert_eq!(h.engine.phase(), Phase::Connecting);
    assert_eq!(h.policies().len(), builds_before + 1);
    assert_eq!(*h.policies().last().unwrap(), TransportPolicy::All);
}

#[tokio::test]
async fn controller_locks_p2p_and_mode_is_immutable() {
    let mut h = harness();
    let rs = h.remote_session;
    let now = Instant::now();
    h.join_as_controller(now).await;
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();

    h.peers
        .set_pairs(vec![pair(CandidateKind::Srflx, CandidateKind::Srflx)]);
    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Connected),
            now,
        )
        .await
        .unwrap();

    assert!(h.engine.is_mode_locked());
    assert_eq!(h.engine.mode(), Some(ConnectionMode::P2p));
    assert_eq!(h.count_sent("connection-mode"), 1);

    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::StatusChanged(SessionStatus::Connected))));
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::ModeLocked {
            mode: ConnectionMode::P2p,
            details: Some(_)
        }
    )));

    // A contradictory broadcast cannot move a locked mode.
    h.engine
        .handle_frame(ServerFrame::ConnectionMode {
            from: PeerId::from("p2"),
            session_id: rs,
            mode: ConnectionMode::Turn,
        })
        .await
        .unwrap();
    assert_eq!(h.engine.mode(), Some(ConnectionMode::P2p));

    // Post-lock failure never re-triggers fallback, only surfaces
    // `reconnecting`.
    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Failed),
            now,
        )
        .await
        .unwrap();
    assert_eq!(h.count_sent("relay-restart"), 0);
    assert_eq!(h.engine.status(), SessionStatus::Reconnecting);
}

#[tokio::test]
async fn follower_mirrors_broadcast_mode() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_follower(Instant::now()).await;

    h.engine
        .handle_frame(ServerFrame::ConnectionMode {
            from: PeerId::from("p1"),
            session_id: rs,
            mode: ConnectionMode::Turn,
        })
        .await
        .unwrap();

    assert!(h.engine.is_mode_locked());
    assert_eq!(h.engine.mode(), Some(ConnectionMode::Turn));
    // The follower never runs detection itself.
    assert_eq!(h.peers.op_count("candidate_pairs"), 0);
    assert_eq!(h.count_sent("connection-mode"), 0);
}

#[tokio::test]
async fn mode_detection_retries_exactly_once() {
    let mut h = harness();
    let rs = h.remote_session;
    let t0 = Instant::now();
    h.join_as_controller(t0).await;
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();

    // No usable pair yet: one retry scheduled at +300 ms.
    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Connected),
            t0,
        )
        .await
        .unwrap();
    assert!(!h.engine.is_mode_locked());
    assert_eq!(h.engine.next_deadline(), Some(t0 + MODE_PROBE_RETRY));

    // The retry finds the pair and locks.
    h.peers
        .set_pairs(vec![pair(CandidateKind::Relay, CandidateKind::Relay)]);
    h.engine.on_tick(t0 + MODE_PROBE_RETRY).await.unwrap();
    assert_eq!(h.engine.mode(), Some(ConnectionMode::Turn));
    assert_eq!(h.peers.op_count("candidate_pairs"), 2);
}

#[tokio::test]
async fn mode_detection_gives_up_after_one_retry() {
    let mut h = harness();
    let rs = h.remote_session;
    let t0 = Instant::now();
    h.join_as_controller(t0).await;
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();

    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Connected),
            t0,
        )
        .await
        .unwrap();
    h.engine.on_tick(t0 + MODE_PROBE_RETRY).await.unwrap();

    assert!(!h.engine.is_mode_locked());
    assert_eq!(h.peers.op_count("candidate_pairs"), 2);
    // No third probe is scheduled; only the heartbeat remains.
    assert_eq!(
        h.engine.next_deadline(),
        Some(t0 + crate::session::HEARTBEAT_PERIOD)
    );
}

#[tokio::test]
async fn hard_ice_failure_falls_back_to_relay_once() {
    let mut h = harness();
    let rs = h.remote_session;
    let now = Instant::now();
    h.join_as_controller(now).await;
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();

    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Failed),
            now,
        )
        .await
        .unwrap();

    assert_eq!(h.count_sent("relay-restart"), 1);
    assert_eq!(h.policies(), vec![TransportPolicy::All, TransportPolicy::Relay]);
    // The controller re-offers over the relay build.
    assert_eq!(h.count_sent("offer"), 1);
    assert_eq!(h.engine.phase(), Phase::RelayFallback);

    // Fallback is one-shot.
    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Failed),
            now,
        )
        .await
        .unwrap();
    assert_eq!(h.count_sent("relay-restart"), 1);
    assert_eq!(h.policies().len(), 2);

    // Relay connect locks turn.
    h.peers
        .set_pairs(vec![pair(CandidateKind::Relay, CandidateKind::Relay)]);
    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Connected),
            now,
        )
        .await
        .unwrap();
    assert_eq!(h.engine.mode(), Some(ConnectionMode::Turn));
}

#[tokio::test]
async fn follower_rebuilds_relay_only_on_relay_restart() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_follower(Instant::now()).await;
    assert_eq!(h.policies(), vec![TransportPolicy::All]);

    h.engine
        .handle_frame(ServerFrame::RelayRestart {
            from: PeerId::from("p1"),
            session_id: rs,
        })
        .await
        .unwrap();
    assert_eq!(h.policies(), vec![TransportPolicy::All, TransportPolicy::Relay]);

    // The controller's relay offer gets answered on the new connection.
    h.engine.handle_frame(offer_from("p1", rs)).await.unwrap();
    assert_eq!(h.count_sent("answer"), 1);
}

#[tokio::test]
async fn disconnected_grace_is_reset_by_ice_activity() {
    let mut h = harness();
    let rs = h.remote_session;
    let t0 = Instant::now();
    h.join_as_controller(t0).await;
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();
    h.drain_events();

    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Disconnected),
            t0,
        )
        .await
        .unwrap();
    assert_eq!(h.engine.next_deadline(), Some(t0 + DISCONNECT_GRACE));

    // Inbound ICE activity pushes the deadline out.
    let t5 = t0 + Duration::from_secs(5);
    h.engine
        .handle_peer_event(crate::peer::PeerEvent::IceCandidate(candidate(9)), t5)
        .await
        .unwrap();
    assert_eq!(h.engine.next_deadline(), Some(t5 + DISCONNECT_GRACE));

    // The original deadline passing is now a no-op.
    h.engine.on_tick(t0 + DISCONNECT_GRACE).await.unwrap();
    assert_eq!(h.count_sent("relay-restart"), 0);

    // Expiry triggers fallback.
    h.engine.on_tick(t5 + DISCONNECT_GRACE).await.unwrap();
    assert_eq!(h.count_sent("relay-restart"), 1);
    assert_eq!(*h.policies().last().unwrap(), TransportPolicy::Relay);
}

#[tokio::test]
async fn leaving_disconnected_cancels_the_grace_timer() {
    let mut h = harness();
    let rs = h.remote_session;
    let t0 = Instant::now();
    h.join_as_controller(t0).await;
    h.engine.handle_frame(offer_from("p2", rs)).await.unwrap();

    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Disconnected),
            t0,
        )
        .await
        .unwrap();
    h.engine
        .handle_peer_event(
            crate::peer::PeerEvent::IceConnectionState(IceConnectionState::Checking),
            t0 + Duration::from_secs(1),
        )
        .await
        .unwrap();

    h.engine.on_tick(t0 + DISCONNECT_GRACE).await.unwrap();
    assert_eq!(h.count_sent("relay-restart"), 0);
}

#[tokio::test]
async fn voice_negotiation_is_guarded() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_follower(Instant::now()).await;
    assert_eq!(h.count_sent("offer"), 1);

    // Initial offer still in flight: the request is deferred.
    h.engine.start_voice().await.unwrap();
    assert_eq!(h.count_sent("offer"), 1);
    assert_eq!(h.peers.op_count("voice:on"), 0);

    // Answer lands; the pending work runs and renegotiates.
    h.engine.handle_frame(answer_from("p1", rs)).await.unwrap();
    assert_eq!(h.peers.op_count("voice:on"), 1);
    assert_eq!(h.count_sent("offer"), 2);

    // Stop requested mid-negotiation: deferred until stable again.
    h.engine.stop_voice().await.unwrap();
    assert_eq!(h.peers.op_count("voice:off"), 0);
    h.engine.handle_frame(answer_from("p1", rs)).await.unwrap();
    assert_eq!(h.peers.op_count("voice:off"), 1);
    assert_eq!(h.count_sent("offer"), 3);
}

#[tokio::test]
async fn file_reassembly_yields_exact_bytes() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_controller(Instant::now()).await;
    h.drain_events();

    let payload: Vec<u8> = (0..40000u32).map(|i| (i % 251) as u8).collect();
    h.engine
        .handle_frame(ServerFrame::FileMetadata {
            from: PeerId::from("p2"),
            from_nickname: "bob".into(),
            session_id: rs,
            data: FileMetadata {
                name: "photo.bin".into(),
                size: payload.len() as u64,
                mime: "application/octet-stream".into(),
                from: Some(PeerId::from("p2")),
                from_nickname: Some("bob".into()),
            },
        })
        .await
        .unwrap();

    for chunk in encode_chunks(&payload) {
        h.engine
            .handle_frame(ServerFrame::FileChunk {
                from: PeerId::from("p2"),
                session_id: rs,
                data: chunk,
            })
            .await
            .unwrap();
    }
    h.engine
        .handle_frame(ServerFrame::FileEof {
            from: PeerId::from("p2"),
            session_id: rs,
            data: None,
        })
        .await
        .unwrap();

    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::FileIncoming { .. })));
    let received = events.iter().find_map(|e| match e {
        SessionEvent::FileReceived { bytes, metadata, .. } => Some((bytes, metadata)),
        _ => None,
    });
    let (bytes, metadata) = received.expect("file should reassemble");
    assert_eq!(*bytes, payload);
    assert_eq!(metadata.name, "photo.bin");
}

#[tokio::test]
async fn session_end_resets_for_a_new_peer() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_controller(Instant::now()).await;
    h.drain_events();

    h.engine
        .handle_frame(ServerFrame::SessionEnd { session_id: rs })
        .await
        .unwrap();

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(e, SessionEvent::SessionEnded)));
    assert_eq!(h.engine.phase(), Phase::Connecting);
    assert!(!h.engine.is_mode_locked());

    // A new peer starts a fresh primary attempt.
    h.engine
        .handle_frame(ServerFrame::PeerJoined {
            peer_id: PeerId::from("p3"),
            nickname: "carol".into(),
            session_id: SessionId::new(),
        })
        .await
        .unwrap();
    assert_eq!(h.engine.phase(), Phase::PrimaryAttempt);
}

#[tokio::test]
async fn promotion_after_peer_left_makes_us_controller() {
    let mut h = harness();
    let rs = h.remote_session;
    h.join_as_follower(Instant::now()).await;
    assert_eq!(h.engine.role(), Some(Role::Follower));

    h.engine
        .handle_frame(ServerFrame::PeerLeft {
            peer_id: PeerId::from("p1"),
            session_id: rs,
        })
        .await
        .unwrap();
    h.engine
        .handle_frame(ServerFrame::RoleUpdate {
            role: Role::Controller,
        })
        .await
        .unwrap();
    assert_eq!(h.engine.role(), Some(Role::Controller));

    // As controller we now wait for the new follower's offer instead of
    // offering ourselves.
    let offers_before = h.count_sent("offer");
    h.engine
        .handle_frame(ServerFrame::PeerJoined {
            peer_id: PeerId::from("p3"),
            nickname: "carol".into(),
            session_id: SessionId::new(),
        })
        .await
        .unwrap();
    assert_eq!(h.count_sent("offer"), offers_before);
}

#[tokio::test]
async fn transport_reopen_mints_a_fresh_session() {
    let mut h = harness();
    let t0 = Instant::now();
    h.join_as_controller(t0).await;
    let old_session = h.engine.session_id();

    h.engine.on_transport_closed();
    h.engine
        .on_transport_open(t0 + Duration::from_secs(3))
        .await
        .unwrap();

    assert_ne!(h.engine.session_id(), old_session);
    let joins: Vec<_> = h
        .sent()
        .into_iter()
        .filter_map(|f| match f {
            ClientFrame::Join { session_id, .. } => Some(session_id),
            _ => None,
        })
        .collect();
    assert_eq!(joins.len(), 2);
    assert_ne!(joins[0], joins[1]);
    assert_eq!(joins[1], h.engine.session_id());
}

#[tokio::test]
async fn heartbeat_pings_every_period() {
    let mut h = harness();
    let t0 = Instant::now();
    h.engine.on_transport_open(t0).await.unwrap();

    let period = crate::session::HEARTBEAT_PERIOD;
    assert_eq!(h.engine.next_deadline(), Some(t0 + period));

    h.engine.on_tick(t0 + period).await.unwrap();
    assert_eq!(h.count_sent("ping"), 1);
    assert_eq!(h.engine.next_deadline(), Some(t0 + period + period));
}

#[tokio::test]
async fn local_candidates_buffer_until_joined() {
    let mut h = harness();
    let t0 = Instant::now();

    // Candidate gathered before the stream is open/joined.
    h.engine
        .handle_peer_event(crate::peer::PeerEvent::IceCandidate(candidate(1)), t0)
        .await
        .unwrap();
    assert_eq!(h.count_sent("ice-candidate"), 0);

    h.engine.on_transport_open(t0).await.unwrap();
    assert_eq!(h.count_sent("ice-candidate"), 0);

    h.engine
        .handle_frame(ServerFrame::Joined {
            role: Role::Controller,
            existing_peers: vec![],
        })
        .await
        .unwrap();
    assert_eq!(h.count_sent("ice-candidate"), 1);
}
