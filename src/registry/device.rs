//! Device record types.
//!
//! All types here are plain data structs. Ownership and mutation rules live
//! in [`crate::registry::DeviceRegistry`] — nothing outside the registry
//! mutates a stored [`Device`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reconciliation state of a managed switch.
///
/// There is no terminal state — a registry entry cycles through these until
/// it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Newly created or reconfigured, no successful sync yet.
    Connecting,
    /// Last sync authenticated, fetched, and parsed successfully.
    Online,
    /// The switch rejected our credentials or could not be reached during
    /// session establishment.
    AuthFailed,
    /// Session was established but the state fetch or parse failed.
    Error,
}

/// Normalized system snapshot reported by a switch.
///
/// Hardware facts (`model_name`, `firmware_version`, `num_ports`) come from
/// the first card of the chassis — multi-card chassis are not aggregated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub sys_name: String,
    pub sys_description: String,
    pub sys_location: String,
    pub sys_contact: String,
    pub model_name: String,
    pub firmware_version: String,
    pub nos_type: String,
    pub chassis_id: String,
    pub num_ports: u32,
    pub is_digital_twin: bool,
}

/// A session token issued by a switch's auth endpoint.
///
/// Token and expiry always travel together — a `Device` either has a full
/// session or none. Expiry is checked on every use, never swept proactively.
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl DeviceSession {
    /// Whether the token must be re-acquired before the next call.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// A managed switch.
///
/// Credentials, the session, and the schema blob are never serialized into
/// API responses; the schema is served only by the download endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: u64,
    /// `address:port` until the first successful sync reports a system name.
    pub display_name: String,
    pub address: String,
    pub port: u16,
    pub use_https: bool,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_info: Option<SystemInfo>,
    #[serde(skip)]
    pub session: Option<DeviceSession>,
    #[serde(skip)]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_fetched_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Base URL of the switch's management API, scheme chosen by `use_https`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.address, self.port)
    }

    /// The provisional display name used before a sync reports `sysName`.
    pub fn endpoint_name(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Connection target and credentials for a new device.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    pub address: String,
    pub port: u16,
    pub use_https: bool,
    pub username: String,
    pub password: String,
}

/// Partial update for an existing device. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub use_https: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DevicePatch {
    /// Whether the patch changes anything at all.
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.port.is_none()
            && self.use_https.is_none()
            && self.username.is_none()
            && self.password.is_none()
    }
}
