//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::client::SwitchClient;
use crate::config::Config;
use crate::registry::DeviceRegistry;
use crate::schema::SchemaManager;
use crate::sync::session::SessionManager;
use crate::sync::Reconciler;

/// Shared application state for the swctl server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// The authoritative device map.
    pub registry: Arc<DeviceRegistry>,
    /// Periodic + on-demand fleet synchronization.
    pub reconciler: Reconciler,
    /// Per-device session brokering (used directly by the system-info push).
    pub sessions: SessionManager,
    /// Shared HTTP client for direct switch calls outside a sync pass.
    pub client: SwitchClient,
    /// Upload tokens and schema retrieval.
    pub schemas: SchemaManager,
}
