//! Admission API handlers.

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::info;
use validator::Validate;

use tandem_common::RoomCode;

use super::admission::AdmissionOutcome;
use super::error::RoomError;
use super::password;
use super::store::NewRoom;
use crate::api::AppState;
use crate::ip::{extract_client_ip, normalize_ip};

/// Attempts at generating a non-colliding room code before giving up.
const CODE_ALLOCATION_ATTEMPTS: usize = 8;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TurnConfigBody {
    #[validate(length(min = 1, message = "at least one TURN URL is required"))]
    pub urls: Vec<String>,
    #[validate(length(min = 1, max = 256))]
    pub username: String,
    #[validate(length(min = 1, max = 256))]
    pub credential: String,
    pub stun_urls: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub created_by: Option<String>,
    #[validate(nested)]
    pub turn_config: TurnConfigBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub password: Option<String>,
    pub nickname: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    pub created_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePasswordRequest {
    pub created_by: String,
}

/// `POST /rooms` — create a room with TURN config and an optional password.
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Response, RoomError> {
    req.validate()
        .map_err(|e| RoomError::Validation(e.to_string()))?;

    let password_hash = req.password.as_deref().map(password::hash).transpose()?;
    let turn_username = state.vault.seal(&req.turn_config.username)?;
    let turn_credential = state.vault.seal(&req.turn_config.credential)?;
    let expires_at = Utc::now() + Duration::hours(state.config.room_ttl_hours);

    // Random 6-hex codes collide rarely; retry a few times before failing.
    for _ in 0..CODE_ALLOCATION_ATTEMPTS {
        let code = RoomCode::generate();
        let result = state
            .store
            .insert_room(NewRoom {
                id: code.clone(),
                password_hash: password_hash.clone(),
                created_by: req.created_by.clone(),
                expires_at,
                turn_urls: req.turn_config.urls.clone(),
                stun_urls: req.turn_config.stun_urls.clone(),
                turn_username: turn_username.clone(),
                turn_credential: turn_credential.clone(),
            })
            .await;

        match result {
            Ok(()) => {
                info!(room_id = %code, has_password = password_hash.is_some(), "Room created");
                return Ok((StatusCode::CREATED, Json(json!({ "roomId": code }))).into_response());
            }
            Err(super::store::StoreError::DuplicateRoom) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(RoomError::CodeAllocation)
}

/// `POST /rooms/:id/join` — password-gated admission.
pub async fn join_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Response, RoomError> {
    let room_id = RoomCode::parse(&id).map_err(|_| RoomError::NotFound)?;
    let ip = extract_client_ip(&headers, Some(&ConnectInfo(addr)), state.config.trust_proxy);
    let source = normalize_ip(ip);

    let outcome = state
        .admission
        .join(
            &room_id,
            req.password.as_deref(),
            req.created_by.as_deref(),
            &source,
            Utc::now(),
        )
        .await?;

    let response = match outcome {
        AdmissionOutcome::Admitted {
            has_password,
            is_creator,
            turn_config,
        } => {
            info!(room_id = %room_id, is_creator, "Peer admitted");
            Json(json!({
                "success": true,
                "hasPassword": has_password,
                "isCreator": is_creator,
                "turnConfig": turn_config,
            }))
            .into_response()
        }
        AdmissionOutcome::BadPassword { attempts_remaining } => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid password",
                "attemptsRemaining": attempts_remaining,
            })),
        )
            .into_response(),
        AdmissionOutcome::Banned => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Too many failed attempts" })),
        )
            .into_response(),
        AdmissionOutcome::NotFound => return Err(RoomError::NotFound),
    };

    Ok(response)
}

/// `GET /rooms/:id` — public room summary with live occupancy.
pub async fn room_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, RoomError> {
    let room_id = RoomCode::parse(&id).map_err(|_| RoomError::NotFound)?;
    let room = state
        .store
        .fetch_active_room(&room_id, Utc::now())
        .await?
        .ok_or(RoomError::NotFound)?;

    let peer_count = state.registry.peer_count(&room_id);
    Ok(Json(json!({
        "id": room.id,
        "hasPassword": room.password_hash.is_some(),
        "peerCount": peer_count,
        "isFull": peer_count >= 2,
    }))
    .into_response())
}

/// `PATCH /rooms/:id/password` — creator-only password change.
pub async fn update_password(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Response, RoomError> {
    req.validate()
        .map_err(|e| RoomError::Validation(e.to_string()))?;

    let room_id = RoomCode::parse(&id).map_err(|_| RoomError::NotFound)?;
    let room = state
        .store
        .fetch_active_room(&room_id, Utc::now())
        .await?
        .ok_or(RoomError::NotFound)?;

    if room.created_by.as_deref() != Some(req.created_by.as_str()) {
        return Err(RoomError::Forbidden);
    }

    let hash = password::hash(&req.password)?;
    state.store.update_password(&room_id, Some(hash)).await?;

    info!(room_id = %room_id, "Room password updated");
    Ok(Json(json!({ "success": true })).into_response())
}

/// `DELETE /rooms/:id/password` — creator-only password removal.
pub async fn remove_password(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RemovePasswordRequest>,
) -> Result<Response, RoomError> {
    let room_id = RoomCode::parse(&id).map_err(|_| RoomError::NotFound)?;
    let room = state
        .store
        .fetch_active_room(&room_id, Utc::now())
        .await?
        .ok_or(RoomError::NotFound)?;

    if room.created_by.as_deref() != Some(req.created_by.as_str()) {
        return Err(RoomError::Forbidden);
    }

    state.store.update_password(&room_id, None).await?;

    info!(room_id = %room_id, "Room password removed");
    Ok(Json(json!({ "success": true })).into_response())
}
