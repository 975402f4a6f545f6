//! Switch CRUD, sync trigger, port listing, and system-info push endpoints.
//!
//! - `GET    /api/v1/switches`             — list the fleet
//! - `POST   /api/v1/switches`             — register a switch
//! - `GET    /api/v1/switches/{id}`        — fetch one switch
//! - `PUT    /api/v1/switches/{id}`        — partial update
//! - `DELETE /api/v1/switches/{id}`        — remove a switch
//! - `POST   /api/v1/switches/{id}/sync`   — trigger an immediate sync
//! - `GET    /api/v1/switches/{id}/ports`  — port table
//! - `PUT    /api/v1/switches/{id}/system` — push identity fields to the switch
//!
//! Create and update both queue an immediate sync, so a registered switch
//! starts converging without waiting for the next periodic pass.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::registry::{Device, DevicePatch, DeviceSpec};
use crate::state::AppState;

/// Request body for `POST /api/v1/switches`.
#[derive(Deserialize)]
pub struct CreateSwitchRequest {
    pub address: String,
    pub port: u16,
    /// Defaults to `true` when omitted — switch management APIs normally
    /// serve HTTPS.
    pub use_https: Option<bool>,
    pub username: String,
    pub password: String,
}

/// Request body for `PUT /api/v1/switches/{id}`. Absent or empty fields are
/// left untouched.
#[derive(Deserialize, Default)]
pub struct UpdateSwitchRequest {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub use_https: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Switch not found", "code": "NOT_FOUND"})),
    )
}

fn invalid(msg: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": msg, "code": "INVALID_REQUEST"})),
    )
}

/// Treat empty strings as "not provided", like absent fields.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `GET /api/v1/switches` — snapshot of the fleet.
pub async fn list_switches(State(state): State<AppState>) -> Json<Value> {
    let switches = state.registry.list().await;
    Json(json!({"switches": switches}))
}

/// `GET /api/v1/switches/{id}` — fetch one switch.
pub async fn get_switch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.registry.get(id).await {
        Some(device) => Ok(Json(json!({"switch": device}))),
        None => Err(not_found()),
    }
}

/// `POST /api/v1/switches` — register a switch and queue its first sync.
pub async fn create_switch(
    State(state): State<AppState>,
    Json(req): Json<CreateSwitchRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if req.address.is_empty() {
        return Err(invalid("address is required"));
    }
    if req.port == 0 {
        return Err(invalid("port is required"));
    }
    if req.username.is_empty() || req.password.is_empty() {
        return Err(invalid("username and password are required"));
    }

    let device = state
        .registry
        .create(DeviceSpec {
            address: req.address,
            port: req.port,
            use_https: req.use_https.unwrap_or(true),
            username: req.username,
            password: req.password,
        })
        .await;
    state.reconciler.trigger(device.id);

    Ok((StatusCode::CREATED, Json(json!({"switch": device}))))
}

/// `PUT /api/v1/switches/{id}` — apply a partial update and queue a re-sync.
pub async fn update_switch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<UpdateSwitchRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let patch = DevicePatch {
        address: non_empty(req.address),
        port: req.port.filter(|p| *p != 0),
        use_https: req.use_https,
        username: non_empty(req.username),
        password: non_empty(req.password),
    };

    match state.registry.update(id, patch).await {
        Some(device) => {
            state.reconciler.trigger(id);
            Ok(Json(json!({"switch": device})))
        }
        None => Err(not_found()),
    }
}

/// `DELETE /api/v1/switches/{id}`.
pub async fn delete_switch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if state.registry.delete(id).await {
        Ok(Json(json!({"message": "Switch deleted"})))
    } else {
        Err(not_found())
    }
}

/// `POST /api/v1/switches/{id}/sync` — queue an immediate sync.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if state.registry.get(id).await.is_none() {
        return Err(not_found());
    }
    state.reconciler.trigger(id);
    Ok(Json(json!({"message": "Sync triggered"})))
}

/// A single entry of the synthesized port table.
#[derive(Serialize)]
pub struct Port {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub speed: String,
}

/// Synthesize the port table from the reported port count. The switch API
/// exposes no per-port state endpoint, so status and speed follow the same
/// fixed pattern the reference dashboard renders.
fn build_port_table(num_ports: u32) -> Vec<Port> {
    (0..num_ports)
        .map(|i| {
            let status = if i % 7 == 0 {
                "down"
            } else if i % 11 == 0 {
                "disabled"
            } else {
                "up"
            };
            let speed = if i % 4 == 0 { "10G" } else { "1G" };
            Port {
                id: i + 1,
                name: format!("GigabitEthernet 1/0/{}", i + 1),
                status: status.to_string(),
                speed: speed.to_string(),
            }
        })
        .collect()
}

/// `GET /api/v1/switches/{id}/ports` — port table for one switch.
pub async fn get_ports(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(device) = state.registry.get(id).await else {
        return Err(not_found());
    };

    let num_ports = device
        .system_info
        .as_ref()
        .map_or(24, |info| info.num_ports);
    Ok(Json(json!({"ports": build_port_table(num_ports)})))
}

/// Request body for `PUT /api/v1/switches/{id}/system`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSystemRequest {
    #[serde(default)]
    pub sys_name: Option<String>,
    #[serde(default)]
    pub sys_location: Option<String>,
    #[serde(default)]
    pub sys_contact: Option<String>,
}

/// `PUT /api/v1/switches/{id}/system` — push operator-edited identity fields
/// to the switch, then refresh the cached snapshot.
///
/// # Error codes
///
/// | HTTP | Code            | Meaning                              |
/// |------|-----------------|--------------------------------------|
/// | 401  | `AUTH_FAILED`   | Could not establish a device session |
/// | 404  | `NOT_FOUND`     | Unknown switch id                    |
/// | 502  | `DEVICE_ERROR`  | The switch rejected the update       |
pub async fn update_system(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<UpdateSystemRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(device) = state.registry.get(id).await else {
        return Err(not_found());
    };

    let token = state.sessions.ensure_session(&device).await.map_err(|e| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": format!("Authentication failed: {e}"), "code": "AUTH_FAILED"})),
        )
    })?;

    // Send only the provided, non-empty fields
    let mut fields = serde_json::Map::new();
    if let Some(name) = req.sys_name.as_deref().filter(|v| !v.is_empty()) {
        fields.insert("sysName".to_string(), json!(name));
    }
    if let Some(location) = req.sys_location.as_deref() {
        fields.insert("sysLocation".to_string(), json!(location));
    }
    if let Some(contact) = req.sys_contact.as_deref() {
        fields.insert("sysContact".to_string(), json!(contact));
    }

    if let Err(e) = state
        .client
        .patch_system(&device, &token, &Value::Object(fields))
        .await
    {
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": format!("Failed to update switch: {e}"), "code": "DEVICE_ERROR"})),
        ));
    }

    let device: Option<Device> = state
        .registry
        .update_cached_identity(
            id,
            req.sys_name.as_deref(),
            req.sys_location.as_deref(),
            req.sys_contact.as_deref(),
        )
        .await;

    match device {
        Some(device) => Ok(Json(json!({"switch": device}))),
        None => Err(not_found()),
    }
}
