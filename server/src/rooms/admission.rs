//! Admission Controller
//!
//! Validates room passwords with rate-limited attempts, enforces bans, and
//! hands decrypted TURN config to authorised peers.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use tandem_common::{RoomCode, TurnConfig};

use super::error::RoomError;
use super::password;
use super::store::RoomStore;
use crate::vault::Vault;

/// Wrong attempts per `(room, source)` before a ban.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long a ban lasts.
#[must_use]
pub fn ban_window() -> Duration {
    Duration::hours(1)
}

/// Result of an admission check.
#[derive(Debug)]
pub enum AdmissionOutcome {
    /// Peer may join; TURN credentials are decrypted.
    Admitted {
        has_password: bool,
        is_creator: bool,
        turn_config: TurnConfig,
    },
    /// Wrong password; counted toward the ban threshold.
    BadPassword { attempts_remaining: u32 },
    /// `(room, source)` is banned.
    Banned,
    /// No active room with that code.
    NotFound,
}

/// Password and ban gate in front of the room store.
#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn RoomStore>,
    vault: Vault,
}

impl AdmissionController {
    #[must_use]
    pub fn new(store: Arc<dyn RoomStore>, vault: Vault) -> Self {
        Self { store, vault }
    }

    /// Run the admission check for one join request.
    ///
    /// The ban check runs before the room lookup so a banned source learns
    /// nothing about whether the room exists.
    pub async fn join(
        &self,
        room_id: &RoomCode,
        supplied_password: Option<&str>,
        created_by: Option<&str>,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<AdmissionOutcome, RoomError> {
        if let Some(state) = self.store.attempt_state(room_id, source).await? {
            if state.is_banned(now) {
                return Ok(AdmissionOutcome::Banned);
            }
        }

        let Some(room) = self.store.fetch_active_room(room_id, now).await? else {
            return Ok(AdmissionOutcome::NotFound);
        };

        let has_password = room.password_hash.is_some();
        let is_creator =
            created_by.is_some() && created_by == room.created_by.as_deref();

        if let Some(stored_hash) = &room.password_hash {
            if !is_creator {
                let matches =
                    supplied_password.is_some_and(|pw| password::verify(pw, stored_hash));
                if !matches {
                    let state = self
                        .store
                        .record_failed_attempt(
                            room_id,
                            source,
                            now,
                            MAX_FAILED_ATTEMPTS,
                            ban_window(),
                        )
                        .await?;
                    if state.attempts >= MAX_FAILED_ATTEMPTS {
                        return Ok(AdmissionOutcome::Banned);
                    }
                    return Ok(AdmissionOutcome::BadPassword {
                        attempts_remaining: MAX_FAILED_ATTEMPTS - state.attempts,
                    });
                }
            }
        }

        self.store.clear_failed_attempts(room_id, source).await?;

        let turn_config = TurnConfig {
            urls: room.turn_urls,
            username: self.vault.open(&room.turn_username)?,
            credential: self.vault.open(&room.turn_credential)?,
            stun_urls: room.stun_urls,
        };

        Ok(AdmissionOutcome::Admitted {
            has_password,
            is_creator,
            turn_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::memory::MemoryRoomStore;
    use crate::rooms::store::NewRoom;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    async fn setup(room_password: Option<&str>, created_by: Option<&str>) -> AdmissionController {
        let vault = Vault::from_hex_key(TEST_KEY).unwrap();
        let store = Arc::new(MemoryRoomStore::new());
        store
            .insert_room(NewRoom {
                id: RoomCode::parse("A1B2C3").unwrap(),
                password_hash: room_password.map(|pw| password::hash(pw).unwrap()),
                created_by: created_by.map(String::from),
                expires_at: Utc::now() + Duration::hours(24),
                turn_urls: vec!["turn:t.example:3478".into()],
                stun_urls: None,
                turn_username: vault.seal("u").unwrap(),
                turn_credential: vault.seal("c").unwrap(),
            })
            .await
            .unwrap();
        AdmissionController::new(store, vault)
    }

    fn room() -> RoomCode {
        RoomCode::parse("A1B2C3").unwrap()
    }

    #[tokio::test]
    async fn open_room_admits_and_decrypts_turn() {
        let admission = setup(None, None).await;
        let outcome = admission
            .join(&room(), None, None, "1.2.3.4", Utc::now())
            .await
            .unwrap();

        match outcome {
            AdmissionOutcome::Admitted {
                has_password,
                is_creator,
                turn_config,
            } => {
                assert!(!has_password);
                assert!(!is_creator);
                assert_eq!(turn_config.username, "u");
                assert_eq!(turn_config.credential, "c");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn creator_bypasses_password() {
        let admission = setup(Some("hunter2"), Some("creator-token")).await;
        let outcome = admission
            .join(&room(), None, Some("creator-token"), "1.2.3.4", Utc::now())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            AdmissionOutcome::Admitted {
                is_creator: true,
                has_password: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn correct_password_resets_counter() {
        let admission = setup(Some("hunter2"), None).await;
        let now = Utc::now();

        for remaining in [4u32, 3] {
            let outcome = admission
                .join(&room(), Some("wrong"), None, "1.2.3.4", now)
                .await
                .unwrap();
            assert!(matches!(
                outcome,
                AdmissionOutcome::BadPassword { attempts_remaining } if attempts_remaining == remaining
            ));
        }

        let outcome = admission
            .join(&room(), Some("hunter2"), None, "1.2.3.4", now)
            .await
            .unwrap();
        assert!(matches!(outcome, AdmissionOutcome::Admitted { .. }));

        // Counter restarted from zero.
        let outcome = admission
            .join(&room(), Some("wrong"), None, "1.2.3.4", now)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            AdmissionOutcome::BadPassword {
                attempts_remaining: 4
            }
        ));
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let admission = setup(None, None).await;
        let outcome = admission
            .join(
                &RoomCode::parse("FFFFFF").unwrap(),
                None,
                None,
                "1.2.3.4",
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, AdmissionOutcome::NotFound));
    }

    #[tokio::test]
    async fn ban_hides_room_existence() {
        let admission = setup(Some("hunter2"), None).await;
        let now = Utc::now();

        for _ in 0..5 {
            admission
                .join(&room(), Some("wrong"), None, "1.2.3.4", now)
                .await
                .unwrap();
        }

        // Banned even with the correct password, and also for an unknown room.
        let outcome = admission
            .join(&room(), Some("hunter2"), None, "1.2.3.4", now)
            .await
            .unwrap();
        assert!(matches!(outcome, AdmissionOutcome::Banned));

        // A different source is unaffected.
        let outcome = admission
            .join(&room(), Some("hunter2"), None, "5.6.7.8", now)
            .await
            .unwrap();
        assert!(matches!(outcome, AdmissionOutcome::Admitted { .. }));
    }
}
