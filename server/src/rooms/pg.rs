//! Postgres Room Store
//!
//! Runtime queries (no compile-time `DATABASE_URL` required). Every write is
//! a single statement; the failed-attempt increment folds the ban decision
//! into the upsert so the counter and the ban stamp cannot diverge.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use tandem_common::{PeerId, RoomCode, SessionId};

use super::store::{AttemptState, NewConnectionAudit, NewRoom, Room, RoomStore, StoreError};

/// Room store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn room_from_row(row: &sqlx::postgres::PgRow) -> Result<Room, StoreError> {
    let id: String = row.try_get("id")?;
    let id = RoomCode::parse(&id)
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
    let turn_urls: Json<Vec<String>> = row.try_get("turn_urls")?;
    let stun_urls: Option<Json<Vec<String>>> = row.try_get("stun_urls")?;

    Ok(Room {
        id,
        password_hash: row.try_get("password_hash")?,
        created_by: row.try_get("created_by")?,
        expires_at: row.try_get("expires_at")?,
        turn_urls: turn_urls.0,
        stun_urls: stun_urls.map(|u| u.0),
        turn_username: row.try_get("turn_username")?,
        turn_credential: row.try_get("turn_credential")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn insert_room(&self, room: NewRoom) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"INSERT INTO rooms
                (id, password_hash, created_by, expires_at,
                 turn_urls, stun_urls, turn_username, turn_credential)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(room.id.as_str())
        .bind(&room.password_hash)
        .bind(&room.created_by)
        .bind(room.expires_at)
        .bind(Json(&room.turn_urls))
        .bind(room.stun_urls.as_ref().map(Json))
        .bind(&room.turn_username)
        .bind(&room.turn_credential)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateRoom)
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn fetch_active_room(
        &self,
        id: &RoomCode,
        now: DateTime<Utc>,
    ) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM rooms WHERE id = $1 AND is_active AND expires_at > $2",
        )
        .bind(id.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(room_from_row).transpose()
    }

    async fn update_password(
        &self,
        id: &RoomCode,
        password_hash: Option<String>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE rooms SET password_hash = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(&password_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn assign_peer_slot(&self, id: &RoomCode, peer: &PeerId) -> Result<(), StoreError> {
        sqlx::query(
            r"UPDATE rooms SET
                peer1 = CASE WHEN peer1 IS NULL OR peer1 = $2 THEN $2 ELSE peer1 END,
                peer2 = CASE WHEN (peer1 IS NOT NULL AND peer1 <> $2)
                              AND (peer2 IS NULL OR peer2 = $2) THEN $2 ELSE peer2 END
              WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(peer.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_peer_slot(&self, id: &RoomCode, peer: &PeerId) -> Result<(), StoreError> {
        sqlx::query(
            r"UPDATE rooms SET
                peer1 = CASE WHEN peer1 = $2 THEN NULL ELSE peer1 END,
                peer2 = CASE WHEN peer2 = $2 THEN NULL ELSE peer2 END
              WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(peer.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attempt_state(
        &self,
        id: &RoomCode,
        source: &str,
    ) -> Result<Option<AttemptState>, StoreError> {
        let row = sqlx::query(
            "SELECT attempts, banned_until FROM failed_attempts
             WHERE room_id = $1 AND ip_address = $2",
        )
        .bind(id.as_str())
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let attempts: i32 = row.get("attempts");
            AttemptState {
                attempts: attempts.max(0) as u32,
                banned_until: row.get("banned_until"),
            }
        }))
    }

    async fn record_failed_attempt(
        &self,
        id: &RoomCode,
        source: &str,
        now: DateTime<Utc>,
        ban_threshold: u32,
        ban_window: Duration,
    ) -> Result<AttemptState, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO failed_attempts (room_id, ip_address, attempts, last_attempt)
              VALUES ($1, $2, 1, $3)
              ON CONFLICT (room_id, ip_address) DO UPDATE SET
                attempts = failed_attempts.attempts + 1,
                last_attempt = $3,
                banned_until = CASE
                    WHEN failed_attempts.attempts + 1 >= $4 THEN $5
                    ELSE failed_attempts.banned_until
                END
              RETURNING attempts, banned_until",
        )
        .bind(id.as_str())
        .bind(source)
        .bind(now)
        .bind(ban_threshold as i32)
        .bind(now + ban_window)
        .fetch_one(&self.pool)
        .await?;

        let attempts: i32 = row.get("attempts");
        Ok(AttemptState {
            attempts: attempts.max(0) as u32,
            banned_until: row.get("banned_until"),
        })
    }

    async fn clear_failed_attempts(&self, id: &RoomCode, source: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM failed_attempts WHERE room_id = $1 AND ip_address = $2")
            .bind(id.as_str())
            .bind(source)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE rooms SET is_active = FALSE WHERE is_active AND expires_at <= $1")
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn record_connection(&self, audit: NewConnectionAudit) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO peer_connections
                (room_id, peer_id, session_id, device, os, browser, connected_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(audit.room_id.as_str())
        .bind(audit.peer_id.as_str())
        .bind(audit.session_id.0)
        .bind(&audit.device)
        .bind(&audit.os)
        .bind(&audit.browser)
        .bind(audit.connected_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_connection_geo(
        &self,
        peer: &PeerId,
        session: SessionId,
        country: Option<String>,
        city: Option<String>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"UPDATE peer_connections SET country = $3, city = $4
              WHERE peer_id = $1 AND session_id = $2 AND disconnected_at IS NULL",
        )
        .bind(peer.as_str())
        .bind(session.0)
        .bind(&country)
        .bind(&city)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn close_connection(
        &self,
        peer: &PeerId,
        session: SessionId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"UPDATE peer_connections SET disconnected_at = $3
              WHERE peer_id = $1 AND session_id = $2 AND disconnected_at IS NULL",
        )
        .bind(peer.as_str())
        .bind(session.0)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
