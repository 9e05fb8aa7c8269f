//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full
//! axum router over the in-memory room store, so no database container is
//! required.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{self, Method, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

use tandem_server::{
    api::{create_router, AppState},
    config::Config,
    rooms::MemoryRoomStore,
};

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryRoomStore>,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test app over a fresh in-memory store.
    pub fn new() -> Self {
        let config = Config::default_for_test();
        let store = Arc::new(MemoryRoomStore::new());
        let state = AppState::new(store.clone(), config).expect("test vault key is valid");
        let router = create_router(state.clone());

        Self {
            router,
            store,
            state,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`,
    /// stamping a connection address so `ConnectInfo` extraction works.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.oneshot_from(request, default_addr()).await
    }

    /// Same as [`Self::oneshot`], from a specific source address.
    pub async fn oneshot_from(
        &self,
        mut request: Request<Body>,
        addr: SocketAddr,
    ) -> Response<Body> {
        request.extensions_mut().insert(ConnectInfo(addr));
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request should not fail")
    }

    /// POST a JSON body.
    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Response<Body> {
        self.post_json_from(uri, body, default_addr()).await
    }

    /// POST a JSON body from a specific source address.
    pub async fn post_json_from(
        &self,
        uri: &str,
        body: &serde_json::Value,
        addr: SocketAddr,
    ) -> Response<Body> {
        let request = Self::request(Method::POST, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.oneshot_from(request, addr).await
    }

    /// Send a JSON body with an arbitrary method.
    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        body: &serde_json::Value,
    ) -> Response<Body> {
        let request = Self::request(method, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.oneshot(request).await
    }
}

/// Default test client address.
pub fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

/// Collect a response body as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Create a room through the API, returning its id.
pub async fn create_room(app: &TestApp, body: serde_json::Value) -> String {
    let resp = app.post_json("/rooms", &body).await;
    assert_eq!(resp.status(), 201, "room creation should succeed");
    let json = body_to_json(resp).await;
    json["roomId"]
        .as_str()
        .expect("roomId in response")
        .to_string()
}
