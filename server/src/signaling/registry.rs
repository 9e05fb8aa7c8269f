//! Peer Registry
//!
//! Process-wide map of live signaling connections. Two maps — peer id to
//! membership and room to member list — guarded by one coarse lock. Lock
//! holders only snapshot data and sender handles; all channel sends happen
//! outside the lock.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::mpsc;

use tandem_common::{PeerId, PeerInfo, Role, RoomCode, ServerFrame, SessionId};

/// Join rejections surfaced as in-band `error` frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("Room is full")]
    RoomFull,
}

/// One live signaling connection.
#[derive(Debug, Clone)]
struct PeerMembership {
    peer_id: PeerId,
    session_id: SessionId,
    room_id: RoomCode,
    nickname: String,
    role: Role,
    tx: mpsc::Sender<ServerFrame>,
}

/// Snapshot of the other member of a room, taken under the lock.
#[derive(Debug, Clone)]
pub struct OtherPeer {
    pub peer_id: PeerId,
    pub nickname: String,
    pub session_id: SessionId,
    pub tx: mpsc::Sender<ServerFrame>,
}

/// Successful join result.
#[derive(Debug)]
pub struct JoinAccepted {
    pub role: Role,
    pub existing_peers: Vec<PeerInfo>,
    /// The member to notify with `peer-joined`, if any.
    pub other: Option<OtherPeer>,
}

/// The peer still in the room after a departure.
#[derive(Debug)]
pub struct RemainingPeer {
    pub peer_id: PeerId,
    pub tx: mpsc::Sender<ServerFrame>,
    /// True when the departure promoted this peer to controller.
    pub promoted: bool,
}

/// Result of removing a membership.
#[derive(Debug)]
pub struct Departure {
    pub room_id: RoomCode,
    pub remaining: Option<RemainingPeer>,
}

/// Relay addressing snapshot for one inbound frame.
#[derive(Debug)]
pub struct RelaySnapshot {
    pub from: PeerId,
    pub from_nickname: String,
    pub other: Option<OtherPeer>,
}

#[derive(Default)]
struct Inner {
    peers: HashMap<PeerId, PeerMembership>,
    rooms: HashMap<RoomCode, Vec<PeerId>>,
}

/// Registry service object; shared via `Arc` and injected into handlers.
#[derive(Default)]
pub struct PeerRegistry {
    inner: Mutex<Inner>,
}

impl PeerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a membership, assigning the role: first member of a room is
    /// controller, second is follower.
    ///
    /// A re-join with a peer id already present in the room (a refresh whose
    /// old stream has not closed yet) replaces the stale membership in place
    /// and keeps its role; the old stream's eventual close is a no-op because
    /// removal is keyed by session id.
    pub fn join(
        &self,
        room_id: RoomCode,
        peer_id: PeerId,
        session_id: SessionId,
        nickname: String,
        tx: mpsc::Sender<ServerFrame>,
    ) -> Result<JoinAccepted, JoinError> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let members = inner.rooms.entry(room_id.clone()).or_default();

        let replacing = members.contains(&peer_id);
        if !replacing && members.len() >= 2 {
            return Err(JoinError::RoomFull);
        }

        let role = if replacing {
            inner.peers[&peer_id].role
        } else if members.is_empty() {
            Role::Controller
        } else {
            Role::Follower
        };

        if !replacing {
            inner
                .rooms
                .get_mut(&room_id)
                .expect("room entry just created")
                .push(peer_id.clone());
        }

        let membership = PeerMembership {
            peer_id: peer_id.clone(),
            session_id,
            room_id: room_id.clone(),
            nickname,
            role,
            tx,
        };
        inner.peers.insert(peer_id.clone(), membership);

        let other = Self::other_member(inner, &room_id, &peer_id);
        let existing_peers = other
            .iter()
            .map(|o| PeerInfo {
                peer_id: o.peer_id.clone(),
                nickname: o.nickname.clone(),
                session_id: o.session_id,
            })
            .collect();

        Ok(JoinAccepted {
            role,
            existing_peers,
            other,
        })
    }

    /// Remove the membership for `peer_id` if it still belongs to
    /// `session_id`, promoting a surviving follower when the controller left.
    pub fn remove_if_session(
        &self,
        peer_id: &PeerId,
        session_id: SessionId,
    ) -> Option<Departure> {
        let mut inner = self.inner.lock().unwrap();

        let membership = inner.peers.get(peer_id)?;
        if membership.session_id != session_id {
            return None;
        }
        let membership = inner.peers.remove(peer_id).expect("membership checked above");
        let was_controller = membership.role.is_controller();
        let room_id = membership.room_id;

        let remaining_id = match inner.rooms.get_mut(&room_id) {
            Some(members) => {
                members.retain(|p| p != peer_id);
                members.first().cloned()
            }
            None => None,
        };
        if remaining_id.is_none() {
            inner.rooms.remove(&room_id);
        }

        let remaining = remaining_id.map(|id| {
            let peer = inner.peers.get_mut(&id).expect("member list entry has a peer");
            let promoted = was_controller && !peer.role.is_controller();
            if promoted {
                peer.role = Role::Controller;
            }
            RemainingPeer {
                peer_id: peer.peer_id.clone(),
                tx: peer.tx.clone(),
                promoted,
            }
        });

        Some(Departure { room_id, remaining })
    }

    /// Addressing snapshot for relaying a frame from `peer_id`. Returns
    /// `None` when the sender is not a member of any room.
    pub fn relay_snapshot(&self, peer_id: &PeerId) -> Option<RelaySnapshot> {
        let inner = self.inner.lock().unwrap();
        let membership = inner.peers.get(peer_id)?;
        let other = Self::other_member(&inner, &membership.room_id, peer_id);
        Some(RelaySnapshot {
            from: membership.peer_id.clone(),
            from_nickname: membership.nickname.clone(),
            other,
        })
    }

    /// Live member count for a room.
    pub fn peer_count(&self, room_id: &RoomCode) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.rooms.get(room_id).map_or(0, Vec::len)
    }

    fn other_member(inner: &Inner, room_id: &RoomCode, peer_id: &PeerId) -> Option<OtherPeer> {
        inner
            .rooms
            .get(room_id)?
            .iter()
            .find(|p| *p != peer_id)
            .and_then(|id| inner.peers.get(id))
            .map(|peer| OtherPeer {
                peer_id: peer.peer_id.clone(),
                nickname: peer.nickname.clone(),
                session_id: peer.session_id,
                tx: peer.tx.clone(),
            })
    }
}
