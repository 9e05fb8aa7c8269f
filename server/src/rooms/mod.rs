//! Room Service
//!
//! Durable rooms with password-gated, rate-limited admission:
//! - Room store trait with Postgres and in-memory implementations
//! - Admission controller (password checks, bans, TURN decryption)
//! - HTTP handlers for the admission API
//! - Periodic expiration sweep

pub mod admission;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod password;
pub mod pg;
pub mod store;
pub mod sweep;

use axum::routing::get;
use axum::Router;

// Re-exports
pub use admission::{AdmissionController, AdmissionOutcome, MAX_FAILED_ATTEMPTS};
pub use error::RoomError;
pub use memory::MemoryRoomStore;
pub use pg::PgRoomStore;
pub use store::{AttemptState, NewConnectionAudit, NewRoom, Room, RoomStore, StoreError};

use crate::api::AppState;

/// Create the admission API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", axum::routing::post(handlers::create_room))
        .route("/rooms/{id}", get(handlers::room_info))
        .route("/rooms/{id}/join", axum::routing::post(handlers::join_room))
        .route(
            "/rooms/{id}/password",
            axum::routing::patch(handlers::update_password)
                .delete(handlers::remove_password),
        )
}
