//! Test-only in-process fake switch.
//!
//! Serves the slice of the switch management API the server consumes, on an
//! ephemeral loopback port, with switchable failure modes so tests can drive
//! every reconciliation state transition.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Shared knobs and counters for a [`FakeSwitch`].
#[derive(Clone, Default)]
pub struct FakeSwitchState {
    pub auth_calls: Arc<AtomicU32>,
    pub state_calls: Arc<AtomicU32>,
    pub upload_requests: Arc<AtomicU32>,
    /// Answer 401 to every auth attempt.
    pub reject_auth: Arc<AtomicBool>,
    /// Answer 500 to every state fetch.
    pub fail_state: Arc<AtomicBool>,
    /// Answer 200 with a non-JSON body to every state fetch.
    pub garble_state: Arc<AtomicBool>,
    /// Answer 500 to every debug-info upload request.
    pub reject_upload_request: Arc<AtomicBool>,
}

/// A fake switch listening on an ephemeral loopback port.
pub struct FakeSwitch {
    pub addr: SocketAddr,
    pub state: FakeSwitchState,
}

impl FakeSwitch {
    pub async fn spawn() -> Self {
        let state = FakeSwitchState::default();
        let app = Router::new()
            .route("/auth/token", post(auth_token))
            .route("/state/system", get(system_state))
            .route("/operation/system/debug-info/upload", post(debug_upload))
            .route("/operation/system", patch(patch_system))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake switch");
        let addr = listener.local_addr().expect("fake switch addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// A registry spec pointing at this fake switch (plain HTTP).
    pub fn spec(&self) -> crate::registry::DeviceSpec {
        crate::registry::DeviceSpec {
            address: "127.0.0.1".to_string(),
            port: self.addr.port(),
            use_https: false,
            username: "admin".to_string(),
            password: "x".to_string(),
        }
    }
}

async fn auth_token(
    State(state): State<FakeSwitchState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if state.reject_auth.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "bad credentials"})),
        );
    }
    let n = state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let ttl = body.get("ttl").and_then(Value::as_u64).unwrap_or(3600);
    (
        StatusCode::OK,
        Json(json!({"token": format!("tok-{n}"), "ttl": ttl})),
    )
}

async fn system_state(State(state): State<FakeSwitchState>, headers: HeaderMap) -> Response {
    if headers.get("X-Auth-Token").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing token"})),
        )
            .into_response();
    }
    if state.fail_state.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "hardware poll failed"})),
        )
            .into_response();
    }
    if state.garble_state.load(Ordering::SeqCst) {
        return (StatusCode::OK, "not json at all").into_response();
    }
    state.state_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "sysName": "sw1",
        "sysDescription": "Fabric Engine test switch",
        "sysLocation": "lab",
        "sysContact": "noc@example.com",
        "nosType": "fabric",
        "chassisId": "00:11:22:33:44:55",
        "isDigitalTwin": false,
        "cards": [
            {"modelName": "M1", "firmwareVersion": "1.0", "numPorts": 24}
        ]
    }))
    .into_response()
}

async fn debug_upload(
    State(state): State<FakeSwitchState>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("X-Auth-Token").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing token"})),
        );
    }
    if state.reject_upload_request.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "upload unavailable"})),
        );
    }
    state.upload_requests.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, Json(json!({"message": "upload scheduled"})))
}

async fn patch_system(headers: HeaderMap, Json(_body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("X-Auth-Token").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing token"})),
        );
    }
    (StatusCode::OK, Json(json!({})))
}
