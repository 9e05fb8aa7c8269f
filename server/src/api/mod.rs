//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::rooms::{self, AdmissionController, RoomStore};
use crate::signaling::{self, PeerRegistry};
use crate::vault::{Vault, VaultError};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Room repository
    pub store: Arc<dyn RoomStore>,
    /// Live peer registry
    pub registry: Arc<PeerRegistry>,
    /// Password/ban gate over the store
    pub admission: AdmissionController,
    /// TURN credential vault
    pub vault: Vault,
    /// Server configuration
    pub config: Arc<Config>,
    /// HTTP client for geolocation lookups
    pub http: reqwest::Client,
}

impl AppState {
    /// Create new application state over a room store.
    pub fn new(store: Arc<dyn RoomStore>, config: Config) -> Result<Self, VaultError> {
        let vault = Vault::from_hex_key(&config.vault_key)?;
        let admission = AdmissionController::new(store.clone(), vault.clone());

        Ok(Self {
            store,
            registry: Arc::new(PeerRegistry::new()),
            admission,
            vault,
            config: Arc::new(config),
            http: reqwest::Client::new(),
        })
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    // In production, set CORS_ALLOWED_ORIGINS to specific origins.
    let cors = if state.config.cors_allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| {
                if let Ok(origin) = o.parse::<axum::http::HeaderValue>() {
                    Some(origin)
                } else {
                    tracing::warn!(origin = %o, "Invalid CORS origin in configuration, skipping");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(rooms::router())
        .route("/ws", get(signaling::ws_handler))
        .route("/health", get(health))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
