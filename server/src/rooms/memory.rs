//! In-memory Room Store
//!
//! Backs the HTTP integration tests and container-less development. Mirrors
//! the Postgres implementation's semantics, including the atomic
//! failed-attempt upsert.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use tandem_common::{PeerId, RoomCode, SessionId};

use super::store::{AttemptState, NewConnectionAudit, NewRoom, Room, RoomStore, StoreError};

#[derive(Debug, Clone)]
struct StoredRoom {
    room: Room,
    peer1: Option<PeerId>,
    peer2: Option<PeerId>,
}

#[derive(Debug, Clone)]
struct StoredAudit {
    audit: NewConnectionAudit,
    country: Option<String>,
    city: Option<String>,
    disconnected_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomCode, StoredRoom>,
    attempts: HashMap<(RoomCode, String), AttemptState>,
    audits: Vec<StoredAudit>,
}

/// Process-local room store.
#[derive(Default)]
pub struct MemoryRoomStore {
    inner: Mutex<Inner>,
}

impl MemoryRoomStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite the ban stamp for `(room, source)`.
    ///
    /// Test support: lets the 1-hour ban window elapse without sleeping.
    pub fn backdate_ban(&self, id: &RoomCode, source: &str, banned_until: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.attempts.get_mut(&(id.clone(), source.to_string())) {
            state.banned_until = Some(banned_until);
        }
    }

    /// Number of audit rows currently open (no `disconnected_at`).
    pub fn open_connections(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .audits
            .iter()
            .filter(|a| a.disconnected_at.is_none())
            .count()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn insert_room(&self, room: NewRoom) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.rooms.contains_key(&room.id) {
            return Err(StoreError::DuplicateRoom);
        }
        inner.rooms.insert(
            room.id.clone(),
            StoredRoom {
                room: Room {
                    id: room.id,
                    password_hash: room.password_hash,
                    created_by: room.created_by,
                    expires_at: room.expires_at,
                    turn_urls: room.turn_urls,
                    stun_urls: room.stun_urls,
                    turn_username: room.turn_username,
                    turn_credential: room.turn_credential,
                    is_active: true,
                },
                peer1: None,
                peer2: None,
            },
        );
        Ok(())
    }

    async fn fetch_active_room(
        &self,
        id: &RoomCode,
        now: DateTime<Utc>,
    ) -> Result<Option<Room>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rooms
            .get(id)
            .filter(|stored| stored.room.is_active && stored.room.expires_at > now)
            .map(|stored| stored.room.clone()))
    }

    async fn update_password(
        &self,
        id: &RoomCode,
        password_hash: Option<String>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.rooms.get_mut(id) {
            Some(stored) => {
                stored.room.password_hash = password_hash;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn assign_peer_slot(&self, id: &RoomCode, peer: &PeerId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.rooms.get_mut(id) {
            if stored.peer1.as_ref() == Some(peer) || stored.peer2.as_ref() == Some(peer) {
                return Ok(());
            }
            if stored.peer1.is_none() {
                stored.peer1 = Some(peer.clone());
            } else if stored.peer2.is_none() {
                stored.peer2 = Some(peer.clone());
            }
        }
        Ok(())
    }

    async fn clear_peer_slot(&self, id: &RoomCode, peer: &PeerId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.rooms.get_mut(id) {
            if stored.peer1.as_ref() == Some(peer) {
                stored.peer1 = None;
            }
            if stored.peer2.as_ref() == Some(peer) {
                stored.peer2 = None;
            }
        }
        Ok(())
    }

    async fn attempt_state(
        &self,
        id: &RoomCode,
        source: &str,
    ) -> Result<Option<AttemptState>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .attempts
            .get(&(id.clone(), source.to_string()))
            .copied())
    }

    async fn record_failed_attempt(
        &self,
        id: &RoomCode,
        source: &str,
        now: DateTime<Utc>,
        ban_threshold: u32,
        ban_window: Duration,
    ) -> Result<AttemptState, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let state = inner
            .attempts
            .entry((id.clone(), source.to_string()))
            .or_insert(AttemptState {
                attempts: 0,
                banned_until: None,
            });
        state.attempts += 1;
        if state.attempts >= ban_threshold {
            state.banned_until = Some(now + ban_window);
        }
        Ok(*state)
    }

    async fn clear_failed_attempts(&self, id: &RoomCode, source: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts.remove(&(id.clone(), source.to_string()));
        Ok(())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0;
        for stored in inner.rooms.values_mut() {
            if stored.room.is_active && stored.room.expires_at <= now {
                stored.room.is_active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn record_connection(&self, audit: NewConnectionAudit) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.audits.push(StoredAudit {
            audit,
            country: None,
            city: None,
            disconnected_at: None,
        });
        Ok(())
    }

    async fn set_connection_geo(
        &self,
        peer: &PeerId,
        session: SessionId,
        country: Option<String>,
        city: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.audits.iter_mut().find(|a| {
            a.audit.peer_id == *peer && a.audit.session_id == session && a.disconnected_at.is_none()
        }) {
            stored.country = country;
            stored.city = city;
        }
        Ok(())
    }

    async fn close_connection(
        &self,
        peer: &PeerId,
        session: SessionId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.audits.iter_mut().find(|a| {
            a.audit.peer_id == *peer && a.audit.session_id == session && a.disconnected_at.is_none()
        }) {
            stored.disconnected_at = Some(now);
        }
        Ok(())
    }
}
