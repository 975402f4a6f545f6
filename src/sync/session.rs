//! Per-device session establishment.
//!
//! Every outbound call to a switch needs a valid session token.
//! [`SessionManager::ensure_session`] reuses the stored token while it is
//! unexpired and re-authenticates otherwise. Authentication failures leave
//! the previously stored session untouched — a still-valid old token stays
//! usable for a later retry.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;

use crate::client::{ClientError, SwitchClient};
use crate::registry::{Device, DeviceRegistry, DeviceSession};

/// Brokers session tokens between the registry and the switch auth endpoint.
///
/// Cloneable — all clones share the same registry and HTTP client.
#[derive(Clone)]
pub struct SessionManager {
    registry: Arc<DeviceRegistry>,
    client: SwitchClient,
    /// TTL in seconds requested from the switch for each new token.
    session_ttl: u64,
}

impl SessionManager {
    pub fn new(registry: Arc<DeviceRegistry>, client: SwitchClient, session_ttl: u64) -> Self {
        Self {
            registry,
            client,
            session_ttl,
        }
    }

    /// Return a token valid for `device`, authenticating first if the stored
    /// session is absent or expired.
    ///
    /// On success the new session is committed to the registry atomically
    /// (token and expiry together). On failure nothing is written; the
    /// caller decides the device status.
    pub async fn ensure_session(&self, device: &Device) -> Result<String, ClientError> {
        if let Some(session) = &device.session {
            if !session.is_expired() {
                return Ok(session.token.clone());
            }
        }

        let grant = self.client.authenticate(device, self.session_ttl).await?;
        let session = DeviceSession {
            token: grant.token.clone(),
            expires_at: Utc::now() + Duration::seconds(i64::try_from(grant.ttl).unwrap_or(i64::MAX)),
        };
        // The device may have been deleted while the call was in flight; the
        // store then no-ops and the token is still used for this one pass.
        self.registry.store_session(device.id, session).await;
        debug!(id = device.id, "Authenticated to switch");
        Ok(grant.token)
    }
}
