//! Room Repository
//!
//! Durable store of rooms, hashed passwords, encrypted TURN config, failed
//! password attempts, and connection audit rows. The coordinator only talks
//! to the [`RoomStore`] trait; production uses the Postgres implementation,
//! tests the in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use tandem_common::{PeerId, RoomCode, SessionId};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Room code already exists")]
    DuplicateRoom,
}

/// A persisted room. TURN username/credential are vault ciphertext.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomCode,
    pub password_hash: Option<String>,
    pub created_by: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub turn_urls: Vec<String>,
    pub stun_urls: Option<Vec<String>>,
    pub turn_username: String,
    pub turn_credential: String,
    pub is_active: bool,
}

/// Insert payload for a new room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub id: RoomCode,
    pub password_hash: Option<String>,
    pub created_by: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub turn_urls: Vec<String>,
    pub stun_urls: Option<Vec<String>>,
    pub turn_username: String,
    pub turn_credential: String,
}

/// Failed-attempt counter state for one `(room, source)` pair.
#[derive(Debug, Clone, Copy)]
pub struct AttemptState {
    pub attempts: u32,
    pub banned_until: Option<DateTime<Utc>>,
}

impl AttemptState {
    /// Whether the pair is banned at `now`.
    #[must_use]
    pub fn is_banned(&self, now: DateTime<Utc>) -> bool {
        self.banned_until.is_some_and(|until| until > now)
    }
}

/// Audit row written when a peer joins a room over the signaling stream.
#[derive(Debug, Clone)]
pub struct NewConnectionAudit {
    pub room_id: RoomCode,
    pub peer_id: PeerId,
    pub session_id: SessionId,
    pub device: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Durable room repository.
///
/// All methods that evaluate time take `now` explicitly so the ban window
/// and room expiry are testable without a clock.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Insert a new room. Fails with [`StoreError::DuplicateRoom`] on a code
    /// collision so callers can regenerate.
    async fn insert_room(&self, room: NewRoom) -> Result<(), StoreError>;

    /// Fetch a room that is active and not expired at `now`.
    async fn fetch_active_room(
        &self,
        id: &RoomCode,
        now: DateTime<Utc>,
    ) -> Result<Option<Room>, StoreError>;

    /// Set or clear the room password hash. Returns false if the room does
    /// not exist.
    async fn update_password(
        &self,
        id: &RoomCode,
        password_hash: Option<String>,
    ) -> Result<bool, StoreError>;

    /// Record a live peer membership in the room's first free slot.
    async fn assign_peer_slot(&self, id: &RoomCode, peer: &PeerId) -> Result<(), StoreError>;

    /// Release the peer's slot.
    async fn clear_peer_slot(&self, id: &RoomCode, peer: &PeerId) -> Result<(), StoreError>;

    /// Current failed-attempt state for `(room, source)`, if any.
    async fn attempt_state(
        &self,
        id: &RoomCode,
        source: &str,
    ) -> Result<Option<AttemptState>, StoreError>;

    /// Atomically increment the failed-attempt counter, stamping a ban of
    /// `ban_window` once the new count reaches `ban_threshold`. Returns the
    /// post-increment state.
    async fn record_failed_attempt(
        &self,
        id: &RoomCode,
        source: &str,
        now: DateTime<Utc>,
        ban_threshold: u32,
        ban_window: Duration,
    ) -> Result<AttemptState, StoreError>;

    /// Delete the failed-attempt record after a successful admission.
    async fn clear_failed_attempts(&self, id: &RoomCode, source: &str) -> Result<(), StoreError>;

    /// Mark every room whose expiry has passed as inactive. Returns the
    /// number of rooms deactivated.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Insert a connection audit row.
    async fn record_connection(&self, audit: NewConnectionAudit) -> Result<(), StoreError>;

    /// Attach geolocation to the open audit row for `(peer, session)`.
    async fn set_connection_geo(
        &self,
        peer: &PeerId,
        session: SessionId,
        country: Option<String>,
        city: Option<String>,
    ) -> Result<(), StoreError>;

    /// Stamp `disconnected_at` on the open audit row for `(peer, session)`.
    async fn close_connection(
        &self,
        peer: &PeerId,
        session: SessionId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
