//! Signaling Router
//!
//! Dispatches inbound frames from one signaling stream: join handling with
//! role assignment, verbatim relay to the other room member with sender
//! identity injected, and lifecycle fan-out on hang-up or stream close.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tandem_common::{ClientFrame, PeerId, Role, RoomCode, ServerFrame, SessionId};

use crate::api::AppState;
use crate::signaling::audit;
use crate::signaling::registry::{JoinError, RelaySnapshot};

/// Whether the socket loop should keep reading after a frame.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameFlow {
    Continue,
    Close,
}

/// Membership established by the stream's `join` frame.
#[derive(Debug, Clone)]
pub struct JoinedPeer {
    pub peer_id: PeerId,
    pub room_id: RoomCode,
    pub session_id: SessionId,
}

/// Per-connection state owned by the socket task.
#[derive(Debug)]
pub struct ConnState {
    pub joined: Option<JoinedPeer>,
    pub source_ip: String,
    pub user_agent: Option<String>,
}

impl ConnState {
    #[must_use]
    pub fn new(source_ip: String, user_agent: Option<String>) -> Self {
        Self {
            joined: None,
            source_ip,
            user_agent,
        }
    }
}

/// Handle one inbound frame.
pub async fn handle_frame(
    state: &AppState,
    conn: &mut ConnState,
    tx: &mpsc::Sender<ServerFrame>,
    frame: ClientFrame,
) -> FrameFlow {
    match frame {
        ClientFrame::Join {
            room_id,
            peer_id,
            nickname,
            session_id,
        } => {
            handle_join(state, conn, tx, room_id, peer_id, nickname, session_id).await;
            FrameFlow::Continue
        }
        ClientFrame::Ping { .. } => FrameFlow::Continue,
        ClientFrame::EndSession { session_id } => handle_end_session(state, conn, session_id).await,
        relayed => {
            relay(state, conn, relayed).await;
            FrameFlow::Continue
        }
    }
}

/// Handle stream close: drop the membership and notify the survivor.
pub async fn handle_disconnect(state: &AppState, conn: &ConnState) {
    if let Some(joined) = &conn.joined {
        depart(state, joined).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_join(
    state: &AppState,
    conn: &mut ConnState,
    tx: &mpsc::Sender<ServerFrame>,
    room_id: RoomCode,
    peer_id: PeerId,
    nickname: String,
    session_id: SessionId,
) {
    if conn.joined.is_some() {
        let _ = tx
            .send(ServerFrame::Error {
                error: "Already joined".into(),
            })
            .await;
        return;
    }

    // The room must exist and still be live; admission already vetted the
    // password over HTTP.
    let room = match state
        .store
        .fetch_active_room(&room_id, chrono::Utc::now())
        .await
    {
        Ok(Some(room)) => room,
        Ok(None) => {
            let _ = tx
                .send(ServerFrame::Error {
                    error: "Room not found".into(),
                })
                .await;
            return;
        }
        Err(e) => {
            warn!(room_id = %room_id, error = %e, "Room lookup failed during join");
            let _ = tx
                .send(ServerFrame::Error {
                    error: "Internal error".into(),
                })
                .await;
            return;
        }
    };

    let accepted = match state.registry.join(
        room.id.clone(),
        peer_id.clone(),
        session_id,
        nickname.clone(),
        tx.clone(),
    ) {
        Ok(accepted) => accepted,
        Err(JoinError::RoomFull) => {
            debug!(room_id = %room_id, peer_id = %peer_id, "Join rejected: room full");
            let _ = tx
                .send(ServerFrame::Error {
                    error: "Room is full".into(),
                })
                .await;
            return;
        }
    };

    conn.joined = Some(JoinedPeer {
        peer_id: peer_id.clone(),
        room_id: room_id.clone(),
        session_id,
    });

    if let Err(e) = state.store.assign_peer_slot(&room_id, &peer_id).await {
        warn!(room_id = %room_id, peer_id = %peer_id, error = %e, "Failed to persist peer slot");
    }

    let _ = tx
        .send(ServerFrame::Joined {
            role: accepted.role,
            existing_peers: accepted.existing_peers,
        })
        .await;

    if let Some(other) = accepted.other {
        let _ = other
            .tx
            .send(ServerFrame::PeerJoined {
                peer_id: peer_id.clone(),
                nickname: nickname.clone(),
                session_id,
            })
            .await;
    }

    audit::record_join(
        state,
        room_id.clone(),
        peer_id.clone(),
        session_id,
        conn.user_agent.clone(),
        conn.source_ip.clone(),
    );

    info!(room_id = %room_id, peer_id = %peer_id, role = ?accepted.role, "Peer joined room");
}

/// Forward a frame to the other room member, stamping the sender identity.
async fn relay(state: &AppState, conn: &ConnState, frame: ClientFrame) {
    let Some(joined) = &conn.joined else {
        debug!("Dropping frame from unjoined stream");
        return;
    };

    let Some(snapshot) = state.registry.relay_snapshot(&joined.peer_id) else {
        debug!(peer_id = %joined.peer_id, "Dropping frame from unregistered peer");
        return;
    };

    let Some(outbound) = annotate(frame, &snapshot) else {
        return;
    };

    if let Some(other) = snapshot.other {
        if other.tx.send(outbound).await.is_err() {
            debug!(peer_id = %other.peer_id, "Relay target stream is gone");
        }
    }
}

/// Convert an inbound relay frame into its outbound twin with `from`
/// injected. Returns `None` for frame types that are not relayed.
fn annotate(frame: ClientFrame, snapshot: &RelaySnapshot) -> Option<ServerFrame> {
    let from = snapshot.from.clone();
    Some(match frame {
        ClientFrame::Offer { session_id, data } => ServerFrame::Offer {
            from,
            session_id,
            data,
        },
        ClientFrame::Answer { session_id, data } => ServerFrame::Answer {
            from,
            session_id,
            data,
        },
        ClientFrame::IceCandidate { session_id, data } => ServerFrame::IceCandidate {
            from,
            session_id,
            data,
        },
        ClientFrame::Chat { session_id, data } => ServerFrame::Chat {
            from,
            session_id,
            data,
        },
        ClientFrame::FileMetadata {
            session_id,
            mut data,
        } => {
            data.from = Some(from.clone());
            data.from_nickname = Some(snapshot.from_nickname.clone());
            ServerFrame::FileMetadata {
                from,
                from_nickname: snapshot.from_nickname.clone(),
                session_id,
                data,
            }
        }
        ClientFrame::FileChunk { session_id, data } => ServerFrame::FileChunk {
            from,
            session_id,
            data,
        },
        ClientFrame::FileEof { session_id, data } => ServerFrame::FileEof {
            from,
            session_id,
            data,
        },
        ClientFrame::NcStatus { session_id, data } => ServerFrame::NcStatus {
            from,
            session_id,
            data,
        },
        ClientFrame::RelayRestart { session_id } => ServerFrame::RelayRestart { from, session_id },
        ClientFrame::ConnectionMode { session_id, mode } => ServerFrame::ConnectionMode {
            from,
            session_id,
            mode,
        },
        ClientFrame::Join { .. } | ClientFrame::EndSession { .. } | ClientFrame::Ping { .. } => {
            return None;
        }
    })
}

async fn handle_end_session(
    state: &AppState,
    conn: &mut ConnState,
    session_id: SessionId,
) -> FrameFlow {
    let Some(joined) = conn.joined.clone() else {
        return FrameFlow::Continue;
    };

    if let Some(snapshot) = state.registry.relay_snapshot(&joined.peer_id) {
        if let Some(other) = snapshot.other {
            let _ = other.tx.send(ServerFrame::SessionEnd { session_id }).await;
        }
    }

    info!(room_id = %joined.room_id, peer_id = %joined.peer_id, "Session ended by peer");
    depart(state, &joined).await;
    conn.joined = None;
    FrameFlow::Close
}

/// Remove the membership, release the persisted slot, close the audit row,
/// and notify the surviving member (`peer-left`, then `role-update` when the
/// departure promoted it).
async fn depart(state: &AppState, joined: &JoinedPeer) {
    let Some(departure) = state
        .registry
        .remove_if_session(&joined.peer_id, joined.session_id)
    else {
        // A newer incarnation of this peer id already replaced us.
        return;
    };

    if let Err(e) = state
        .store
        .clear_peer_slot(&departure.room_id, &joined.peer_id)
        .await
    {
        warn!(room_id = %departure.room_id, error = %e, "Failed to release peer slot");
    }

    audit::record_disconnect(state, joined.peer_id.clone(), joined.session_id);

    if let Some(remaining) = departure.remaining {
        let _ = remaining
            .tx
            .send(ServerFrame::PeerLeft {
                peer_id: joined.peer_id.clone(),
                session_id: joined.session_id,
            })
            .await;

        if remaining.promoted {
            let _ = remaining
                .tx
                .send(ServerFrame::RoleUpdate {
                    role: Role::Controller,
                })
                .await;
            info!(room_id = %departure.room_id, peer_id = %remaining.peer_id, "Follower promoted to controller");
        }
    }

    info!(room_id = %departure.room_id, peer_id = %joined.peer_id, "Peer left room");
}
