//! Reconciliation scheduler.
//!
//! [`Reconciler`] drives the fleet toward the state the switches report:
//! a periodic ticker snapshots the registry and spawns one sync task per
//! device, and external events (create, update, explicit sync request)
//! trigger the same per-device routine immediately via [`Reconciler::trigger`].
//!
//! ## State machine
//!
//! Each sync moves the device through `{connecting, online, auth_failed,
//! error}`: session ensured + state fetched + parsed → `online`; session
//! establishment failed → `auth_failed`; fetch or parse failed → `error`.
//! Create/update reset to `connecting` in the registry, outside this module.
//!
//! ## Concurrency
//!
//! Overlapping syncs for the same device are NOT deduplicated — a periodic
//! tick may race an on-demand trigger. Every commit is atomic under the
//! registry lock, so the record stays consistent and the logical result is
//! last-write-wins. One device's failure or slow switch never delays the
//! rest of the pass; each device runs in its own task, bounded by the
//! client's per-call timeout. There is no retry — the next tick retries.

pub mod session;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::SwitchClient;
use crate::registry::{DeviceRegistry, DeviceStatus};
use session::SessionManager;

/// Periodic + on-demand fleet synchronization.
///
/// Cloneable — all clones share the registry, session manager, and client.
#[derive(Clone)]
pub struct Reconciler {
    registry: Arc<DeviceRegistry>,
    sessions: SessionManager,
    client: SwitchClient,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        sessions: SessionManager,
        client: SwitchClient,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            sessions,
            client,
            interval,
        }
    }

    /// Start the periodic loop. The returned handle completes once the
    /// shutdown signal fires; in-flight per-device syncs are not cancelled
    /// and may finish after it (their commits no-op if the device is gone).
    pub fn spawn(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let reconciler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reconciler.interval);
            // The first tick completes immediately; consume it so passes
            // start one interval after spawn.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => reconciler.sync_all().await,
                    _ = shutdown.changed() => {
                        info!("Reconciler stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Snapshot the fleet and spawn one independent sync task per device.
    pub async fn sync_all(&self) {
        let devices = self.registry.list().await;
        debug!(count = devices.len(), "Fleet sync pass");
        for device in devices {
            self.trigger(device.id);
        }
    }

    /// Queue an immediate sync for one device, independent of the ticker.
    pub fn trigger(&self, id: u64) {
        let reconciler = self.clone();
        tokio::spawn(async move {
            reconciler.sync_device(id).await;
        });
    }

    /// Run one sync: ensure session → fetch state → commit the result.
    ///
    /// All failures are contained here: they are logged, mapped onto the
    /// device status, and never propagate to the caller.
    pub async fn sync_device(&self, id: u64) {
        let Some(device) = self.registry.get(id).await else {
            return;
        };
        debug!(id, endpoint = %device.endpoint_name(), "Syncing switch");

        let token = match self.sessions.ensure_session(&device).await {
            Ok(token) => token,
            Err(e) => {
                warn!(id, name = %device.display_name, "Auth failed: {e}");
                self.registry
                    .mark_status(id, DeviceStatus::AuthFailed)
                    .await;
                return;
            }
        };

        let state = match self.client.system_state(&device, &token).await {
            Ok(state) => state,
            Err(e) => {
                warn!(id, name = %device.display_name, "State fetch failed: {e}");
                self.registry.mark_status(id, DeviceStatus::Error).await;
                return;
            }
        };

        let synced_at = Utc::now();
        let snapshot = state.into_info();
        info!(
            id,
            name = %snapshot.sys_name,
            model = %snapshot.model_name,
            firmware = %snapshot.firmware_version,
            "Switch synced"
        );
        self.registry.commit_sync(id, snapshot, synced_at).await;
    }
}
