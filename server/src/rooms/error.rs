//! Room Service Errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::store::StoreError;
use crate::vault::VaultError;

/// Errors that can occur during room operations.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Room not found (or expired, which is indistinguishable on purpose).
    #[error("Room not found")]
    NotFound,

    /// Creator-only operation attempted by a non-creator.
    #[error("Not authorized for this room")]
    Forbidden,

    /// Malformed request body.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Could not allocate a unique room code.
    #[error("Room code space exhausted")]
    CodeAllocation,

    /// Password hashing failed.
    #[error("Password hashing failed")]
    PasswordHash,

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Credential vault error.
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::NotFound => (StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", self.to_string()),
            Self::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.to_string()),
            Self::CodeAllocation => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
            Self::PasswordHash | Self::Store(_) | Self::Vault(_) => {
                tracing::error!("Room operation failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
