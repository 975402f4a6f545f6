//! Device registry — the single authority over the fleet.
//!
//! [`DeviceRegistry`] owns the map of device id → [`Device`], allocates ids,
//! and is the only place device records are mutated. External callers use
//! the CRUD surface; the sync and schema pipelines write results back
//! through the commit methods, which silently no-op when the device was
//! deleted mid-flight.
//!
//! ## Concurrency
//!
//! The map and the id counter sit behind one `RwLock`. Read operations
//! (get, list) take a read lock and return independent clones — callers
//! never hold references into registry storage. Mutations take the write
//! lock for the whole check-and-modify, so id allocation and field updates
//! are atomic with respect to each other.

pub mod device;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

pub use device::{Device, DevicePatch, DeviceSession, DeviceSpec, DeviceStatus, SystemInfo};

struct Inner {
    devices: HashMap<u64, Device>,
    next_id: u64,
}

/// Concurrency-safe in-memory store of managed switches.
///
/// State is volatile: nothing is persisted, the fleet view is rebuilt by
/// polling after a restart.
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                devices: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Register a new switch. Assigns the next id (never reused) and starts
    /// the record in [`DeviceStatus::Connecting`].
    pub async fn create(&self, spec: DeviceSpec) -> Device {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let device = Device {
            id,
            display_name: format!("{}:{}", spec.address, spec.port),
            address: spec.address,
            port: spec.port,
            use_https: spec.use_https,
            username: spec.username,
            password: spec.password,
            status: DeviceStatus::Connecting,
            last_sync: None,
            system_info: None,
            session: None,
            schema: None,
            schema_fetched_at: None,
        };
        inner.devices.insert(id, device.clone());
        debug!(id, endpoint = %device.display_name, "Device registered");
        device
    }

    /// Fetch a snapshot copy of a device.
    pub async fn get(&self, id: u64) -> Option<Device> {
        self.inner.read().await.devices.get(&id).cloned()
    }

    /// Snapshot of the whole fleet. Iteration order is not meaningful.
    pub async fn list(&self) -> Vec<Device> {
        self.inner.read().await.devices.values().cloned().collect()
    }

    /// Number of registered devices.
    pub async fn count(&self) -> usize {
        self.inner.read().await.devices.len()
    }

    /// Apply a partial update. Only `Some` fields are written.
    ///
    /// Any applied change resets the device to `connecting` and recomputes
    /// the provisional display name; a new password additionally drops the
    /// stored session so the next sync re-authenticates.
    pub async fn update(&self, id: u64, patch: DevicePatch) -> Option<Device> {
        let mut inner = self.inner.write().await;
        let device = inner.devices.get_mut(&id)?;

        if patch.is_empty() {
            return Some(device.clone());
        }

        if let Some(address) = patch.address {
            device.address = address;
        }
        if let Some(port) = patch.port {
            device.port = port;
        }
        if let Some(use_https) = patch.use_https {
            device.use_https = use_https;
        }
        if let Some(username) = patch.username {
            device.username = username;
        }
        if let Some(password) = patch.password {
            device.password = password;
            // Force re-authentication with the new credentials
            device.session = None;
        }

        device.display_name = device.endpoint_name();
        device.status = DeviceStatus::Connecting;
        Some(device.clone())
    }

    /// Remove a device. Returns `false` if the id is unknown.
    pub async fn delete(&self, id: u64) -> bool {
        let removed = self.inner.write().await.devices.remove(&id).is_some();
        if removed {
            debug!(id, "Device deleted");
        }
        removed
    }

    // ─── Commit methods used by the sync and schema pipelines ────────────────
    //
    // All of these tolerate a device deleted while the caller's task was in
    // flight: they return `false` and change nothing.

    /// Set only the reconciliation status.
    pub async fn mark_status(&self, id: u64, status: DeviceStatus) -> bool {
        let mut inner = self.inner.write().await;
        match inner.devices.get_mut(&id) {
            Some(device) => {
                device.status = status;
                true
            }
            None => false,
        }
    }

    /// Store a freshly issued session token and its expiry.
    pub async fn store_session(&self, id: u64, session: DeviceSession) -> bool {
        let mut inner = self.inner.write().await;
        match inner.devices.get_mut(&id) {
            Some(device) => {
                device.session = Some(session);
                true
            }
            None => false,
        }
    }

    /// Commit a fully successful sync: status `online`, sync time, snapshot,
    /// and the reported system name as display name when non-empty.
    pub async fn commit_sync(&self, id: u64, info: SystemInfo, at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.devices.get_mut(&id) {
            Some(device) => {
                device.status = DeviceStatus::Online;
                device.last_sync = Some(at);
                if !info.sys_name.is_empty() {
                    device.display_name = info.sys_name.clone();
                }
                device.system_info = Some(info);
                true
            }
            None => false,
        }
    }

    /// Merge operator-edited identity fields into the cached snapshot after
    /// they were pushed to the switch.
    pub async fn update_cached_identity(
        &self,
        id: u64,
        sys_name: Option<&str>,
        sys_location: Option<&str>,
        sys_contact: Option<&str>,
    ) -> Option<Device> {
        let mut inner = self.inner.write().await;
        let device = inner.devices.get_mut(&id)?;
        let info = device.system_info.get_or_insert_with(SystemInfo::default);
        if let Some(name) = sys_name {
            if !name.is_empty() {
                info.sys_name = name.to_string();
                device.display_name = name.to_string();
            }
        }
        if let Some(location) = sys_location {
            info.sys_location = location.to_string();
        }
        if let Some(contact) = sys_contact {
            info.sys_contact = contact.to_string();
        }
        Some(device.clone())
    }

    /// Attach a retrieved schema to the device record.
    pub async fn store_schema(&self, id: u64, schema: String, at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.devices.get_mut(&id) {
            Some(device) => {
                device.schema = Some(schema);
                device.schema_fetched_at = Some(at);
                true
            }
            None => false,
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
