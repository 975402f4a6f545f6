//! Schema retrieval pipeline.
//!
//! Retrieval is two-phase and asymmetric in transport:
//!
//! - **Phase A** ([`SchemaManager::request_schema`]): mint an upload token
//!   bound to the device, schedule its unconditional removal after the
//!   configured lifetime, then ask the switch — over its own API — to push
//!   its schema bundle to our callback URL embedding the token.
//! - **Phase B** ([`SchemaManager::receive_upload`]): the switch calls back
//!   with the bundle; the token is consumed (single-use) and the schema is
//!   stored on the device record, extracting it from a tar.gz when the
//!   payload is compressed.
//!
//! The token is registered before the outbound push request, so a push
//! failure still leaves a token that expires unused — never a dangling
//! callback without a token.
//!
//! ## Concurrency
//!
//! The token table has its own `RwLock`, independent of the registry lock
//! (the two are never held together). Consumption removes the entry under
//! the write lock, which is what makes acceptance exactly-once even with
//! concurrent callbacks.

pub mod archive;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{ClientError, DebugUploadRequest, SwitchClient};
use crate::registry::DeviceRegistry;
use crate::sync::session::SessionManager;

/// Errors surfaced by the schema pipeline.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The requested device id is not in the registry.
    #[error("device not found")]
    DeviceNotFound,
    /// Callback token absent — expired, already consumed, or never issued.
    #[error("unknown or expired upload token")]
    UnknownToken,
    /// The switch could not be reached or rejected the push request.
    #[error(transparent)]
    Device(#[from] ClientError),
}

/// A pending upload authorization bound to one device.
struct UploadToken {
    device_id: u64,
    created_at: DateTime<Utc>,
}

/// Owns the upload-token table and both phases of schema retrieval.
///
/// Cloneable — all clones share the token table, registry, and client.
#[derive(Clone)]
pub struct SchemaManager {
    tokens: Arc<RwLock<HashMap<String, UploadToken>>>,
    registry: Arc<DeviceRegistry>,
    sessions: SessionManager,
    client: SwitchClient,
    /// Externally reachable base URL of this server (injected config).
    callback_base: String,
    token_ttl: Duration,
}

impl SchemaManager {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        sessions: SessionManager,
        client: SwitchClient,
        callback_base: String,
        token_ttl: Duration,
    ) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
            registry,
            sessions,
            client,
            callback_base,
            token_ttl,
        }
    }

    /// Phase A — ask `id` to push its schema bundle to our callback URL.
    ///
    /// Returns the minted token. The token and its expiry timer exist as
    /// soon as this is called, independent of whether the push request
    /// reaches the switch.
    pub async fn request_schema(&self, id: u64) -> Result<String, SchemaError> {
        let device = self
            .registry
            .get(id)
            .await
            .ok_or(SchemaError::DeviceNotFound)?;

        let token = format!("{id}-{}", Utc::now().timestamp());
        self.tokens.write().await.insert(
            token.clone(),
            UploadToken {
                device_id: id,
                created_at: Utc::now(),
            },
        );
        self.schedule_expiry(token.clone());

        let session = self.sessions.ensure_session(&device).await?;
        let callback = format!(
            "{}/api/v1/upload/schema/{token}",
            self.callback_base.trim_end_matches('/')
        );
        let request = DebugUploadRequest {
            url: callback,
            info_type: vec!["OPENAPI_SCHEMA".to_string()],
            // Throwaway credentials for the switch's HTTP push; the callback
            // endpoint itself is correlated by token, not by these.
            username: "upload".to_string(),
            password: Uuid::new_v4().simple().to_string(),
        };
        self.client
            .request_debug_upload(&device, &session, &request)
            .await?;

        info!(id, token = %token, "Schema upload requested");
        Ok(token)
    }

    /// Phase B — consume `token` and store the uploaded payload.
    ///
    /// Acceptance is exactly-once: the token is removed under the write lock
    /// before anything else happens, so a concurrent duplicate callback sees
    /// [`SchemaError::UnknownToken`]. Returns the device id the upload was
    /// attributed to.
    pub async fn receive_upload(&self, token: &str, payload: &[u8]) -> Result<u64, SchemaError> {
        let Some(pending) = self.tokens.write().await.remove(token) else {
            return Err(SchemaError::UnknownToken);
        };
        let age_secs = (Utc::now() - pending.created_at).num_seconds();

        let schema = if archive::looks_gzipped(payload) {
            match archive::extract_openapi(payload) {
                Ok(content) => content,
                Err(e) => {
                    // Non-fatal: keep the raw bytes rather than reject the upload
                    warn!(
                        device = pending.device_id,
                        "Archive extraction failed ({e}), storing raw payload"
                    );
                    String::from_utf8_lossy(payload).into_owned()
                }
            }
        } else {
            String::from_utf8_lossy(payload).into_owned()
        };

        let bytes = schema.len();
        if self
            .registry
            .store_schema(pending.device_id, schema, Utc::now())
            .await
        {
            info!(
                device = pending.device_id,
                bytes, age_secs, "Schema received"
            );
        } else {
            warn!(
                device = pending.device_id,
                "Upload arrived for a deleted device, dropping schema"
            );
        }
        Ok(pending.device_id)
    }

    /// Number of unconsumed tokens (observability).
    pub async fn pending_tokens(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Remove the token after its lifetime, used or not.
    fn schedule_expiry(&self, token: String) {
        let tokens = Arc::clone(&self.tokens);
        let ttl = self.token_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if tokens.write().await.remove(&token).is_some() {
                debug!(token = %token, "Upload token expired unused");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeSwitch;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::sync::atomic::Ordering;

    fn manager(registry: &Arc<DeviceRegistry>, token_ttl: Duration) -> SchemaManager {
        let client = SwitchClient::new(Duration::from_secs(2));
        SchemaManager::new(
            Arc::clone(registry),
            SessionManager::new(Arc::clone(registry), client.clone(), 3600),
            client,
            "http://mgmt.example.com:9301".to_string(),
            token_ttl,
        )
    }

    async fn insert_token(manager: &SchemaManager, token: &str, device_id: u64) {
        manager.tokens.write().await.insert(
            token.to_string(),
            UploadToken {
                device_id,
                created_at: Utc::now(),
            },
        );
    }

    fn schema_tar_gz(content: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "config/openapi.yaml", content.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[tokio::test]
    async fn request_schema_registers_token_and_pushes_request() {
        let switch = FakeSwitch::spawn().await;
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));

        let device = registry.create(switch.spec()).await;
        let token = manager.request_schema(device.id).await.unwrap();

        assert!(token.starts_with(&format!("{}-", device.id)));
        assert_eq!(manager.pending_tokens().await, 1);
        assert_eq!(switch.state.upload_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_push_request_still_leaves_the_token_registered() {
        let switch = FakeSwitch::spawn().await;
        switch.state.reject_upload_request.store(true, Ordering::SeqCst);
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));

        let device = registry.create(switch.spec()).await;
        let err = manager.request_schema(device.id).await.unwrap_err();
        assert!(matches!(err, SchemaError::Device(_)));
        // The token was minted before the push and survives its failure
        assert_eq!(manager.pending_tokens().await, 1);
    }

    #[tokio::test]
    async fn request_schema_for_unknown_device_is_rejected() {
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));
        assert!(matches!(
            manager.request_schema(42).await,
            Err(SchemaError::DeviceNotFound)
        ));
        assert_eq!(manager.pending_tokens().await, 0);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));
        assert!(matches!(
            manager.receive_upload("nope", b"payload").await,
            Err(SchemaError::UnknownToken)
        ));
    }

    #[tokio::test]
    async fn token_is_consumed_exactly_once() {
        let switch = FakeSwitch::spawn().await;
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));

        let device = registry.create(switch.spec()).await;
        insert_token(&manager, "1-100", device.id).await;

        manager.receive_upload("1-100", b"openapi: 3.0.0").await.unwrap();
        assert!(matches!(
            manager.receive_upload("1-100", b"openapi: 3.0.0").await,
            Err(SchemaError::UnknownToken)
        ));
    }

    #[tokio::test]
    async fn raw_payload_is_stored_verbatim() {
        let switch = FakeSwitch::spawn().await;
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));

        let device = registry.create(switch.spec()).await;
        insert_token(&manager, "1-101", device.id).await;
        manager.receive_upload("1-101", b"openapi: 3.0.0\n").await.unwrap();

        let device = registry.get(device.id).await.unwrap();
        assert_eq!(device.schema.as_deref(), Some("openapi: 3.0.0\n"));
        assert!(device.schema_fetched_at.is_some());
    }

    #[tokio::test]
    async fn gzipped_archive_is_extracted() {
        let switch = FakeSwitch::spawn().await;
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));

        let device = registry.create(switch.spec()).await;
        insert_token(&manager, "1-102", device.id).await;

        let payload = schema_tar_gz("openapi: 3.0.0\ninfo:\n  title: sw1\n");
        manager.receive_upload("1-102", &payload).await.unwrap();

        let device = registry.get(device.id).await.unwrap();
        assert_eq!(
            device.schema.as_deref(),
            Some("openapi: 3.0.0\ninfo:\n  title: sw1\n")
        );
    }

    #[tokio::test]
    async fn archive_without_schema_entry_falls_back_to_raw_bytes() {
        let switch = FakeSwitch::spawn().await;
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));

        let device = registry.create(switch.spec()).await;
        insert_token(&manager, "1-103", device.id).await;

        let mut builder =
            tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "notes.txt", &b"text"[..]).unwrap();
        let payload = builder.into_inner().unwrap().finish().unwrap();

        manager.receive_upload("1-103", &payload).await.unwrap();

        let device = registry.get(device.id).await.unwrap();
        // Fallback stores the (lossy) raw archive bytes, not a rejection
        let stored = device.schema.expect("schema stored");
        assert_eq!(stored, String::from_utf8_lossy(&payload));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let switch = FakeSwitch::spawn().await;
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_millis(50));

        let device = registry.create(switch.spec()).await;
        insert_token(&manager, "1-104", device.id).await;
        manager.schedule_expiry("1-104".to_string());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(manager.pending_tokens().await, 0);
        assert!(matches!(
            manager.receive_upload("1-104", b"late").await,
            Err(SchemaError::UnknownToken)
        ));
    }

    #[tokio::test]
    async fn upload_for_deleted_device_consumes_token_without_storing() {
        let switch = FakeSwitch::spawn().await;
        let registry = Arc::new(DeviceRegistry::new());
        let manager = manager(&registry, Duration::from_secs(600));

        let device = registry.create(switch.spec()).await;
        insert_token(&manager, "1-105", device.id).await;
        registry.delete(device.id).await;

        manager.receive_upload("1-105", b"payload").await.unwrap();
        assert_eq!(manager.pending_tokens().await, 0);
    }
}
