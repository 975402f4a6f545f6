//! HTTP client for the switch management API.
//!
//! [`SwitchClient`] wraps `reqwest::Client` and provides typed methods for
//! each switch endpoint the server consumes. One client is built at startup
//! and shared — per-device state (address, scheme, credentials, token) is
//! passed in per call.
//!
//! ## Transport
//!
//! Switches ship self-signed certificates, so certificate validation is
//! disabled. Every call is bounded by the configured request timeout; there
//! is no retry here — the next reconciliation pass is the retry mechanism.
//!
//! ## Error handling
//!
//! Transport failures, non-2xx statuses (with the response body kept for
//! diagnostics), and malformed bodies map to the three [`ClientError`]
//! variants. Callers decide which device status each variant maps to.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{Device, SystemInfo};

/// Errors from a single switch API call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connection refused, timeout, DNS, TLS).
    #[error("connection failed: {0}")]
    Connection(#[from] reqwest::Error),
    /// The switch answered with a non-2xx status.
    #[error("switch returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Successful response from `POST /auth/token`.
#[derive(Debug, Deserialize)]
pub struct AuthGrant {
    pub token: String,
    pub ttl: u64,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
    ttl: u64,
}

/// Wire shape of `GET /state/system`.
///
/// Fields the switch omits decode to their defaults; a chassis reports one
/// sub-record per card.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemState {
    pub sys_name: String,
    pub sys_description: String,
    pub sys_location: String,
    pub sys_contact: String,
    pub nos_type: String,
    pub chassis_id: String,
    pub is_digital_twin: bool,
    pub cards: Vec<CardState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardState {
    pub model_name: String,
    pub firmware_version: String,
    pub num_ports: u32,
}

impl SystemState {
    /// Normalize into the registry snapshot, reading hardware facts from the
    /// first card only.
    pub fn into_info(mut self) -> SystemInfo {
        let card = if self.cards.is_empty() {
            CardState::default()
        } else {
            self.cards.swap_remove(0)
        };
        SystemInfo {
            sys_name: self.sys_name,
            sys_description: self.sys_description,
            sys_location: self.sys_location,
            sys_contact: self.sys_contact,
            model_name: card.model_name,
            firmware_version: card.firmware_version,
            nos_type: self.nos_type,
            chassis_id: self.chassis_id,
            num_ports: card.num_ports,
            is_digital_twin: self.is_digital_twin,
        }
    }
}

/// Body of `POST /operation/system/debug-info/upload` — asks the switch to
/// push a named diagnostic bundle to `url` with the supplied throwaway
/// credentials.
#[derive(Debug, Serialize)]
pub struct DebugUploadRequest {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "infoType")]
    pub info_type: Vec<String>,
    pub username: String,
    pub password: String,
}

/// Header carrying the per-device session token.
const AUTH_HEADER: &str = "X-Auth-Token";

/// Typed client for the switch management API.
#[derive(Clone)]
pub struct SwitchClient {
    http: reqwest::Client,
}

impl SwitchClient {
    /// Build the shared client with a fixed per-call timeout.
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            // Switch management interfaces run on self-signed certs
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to build HTTP client");
        Self { http }
    }

    /// `POST /auth/token` — exchange credentials for a session token.
    pub async fn authenticate(&self, device: &Device, ttl: u64) -> Result<AuthGrant, ClientError> {
        let resp = self
            .http
            .post(format!("{}/auth/token", device.base_url()))
            .json(&AuthRequest {
                username: &device.username,
                password: &device.password,
                ttl,
            })
            .send()
            .await?;
        Self::decode_json(resp).await
    }

    /// `GET /state/system` — fetch the current system/card state.
    pub async fn system_state(
        &self,
        device: &Device,
        token: &str,
    ) -> Result<SystemState, ClientError> {
        let resp = self
            .http
            .get(format!("{}/state/system", device.base_url()))
            .header(AUTH_HEADER, token)
            .send()
            .await?;
        Self::decode_json(resp).await
    }

    /// `POST /operation/system/debug-info/upload` — ask the switch to push a
    /// diagnostic bundle to the given callback URL.
    pub async fn request_debug_upload(
        &self,
        device: &Device,
        token: &str,
        request: &DebugUploadRequest,
    ) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(format!(
                "{}/operation/system/debug-info/upload",
                device.base_url()
            ))
            .header(AUTH_HEADER, token)
            .json(request)
            .send()
            .await?;
        Self::check_status(resp).await.map(|_| ())
    }

    /// `PATCH /operation/system` — push operator-edited identity fields.
    /// Only the keys present in `fields` are sent.
    pub async fn patch_system(
        &self,
        device: &Device,
        token: &str,
        fields: &serde_json::Value,
    ) -> Result<(), ClientError> {
        let resp = self
            .http
            .patch(format!("{}/operation/system", device.base_url()))
            .header(AUTH_HEADER, token)
            .json(fields)
            .send()
            .await?;
        Self::check_status(resp).await.map(|_| ())
    }

    /// Reject non-2xx responses, keeping the body for diagnostics.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Reject non-2xx, then decode the body as JSON.
    async fn decode_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_state_normalizes_first_card_only() {
        let state: SystemState = serde_json::from_str(
            r#"{
                "sysName": "sw1",
                "sysDescription": "Fabric Engine",
                "nosType": "fabric",
                "chassisId": "00:11:22:33:44:55",
                "isDigitalTwin": true,
                "cards": [
                    {"modelName": "M1", "firmwareVersion": "1.0", "numPorts": 24},
                    {"modelName": "M2", "firmwareVersion": "2.0", "numPorts": 48}
                ]
            }"#,
        )
        .unwrap();
        let info = state.into_info();
        assert_eq!(info.sys_name, "sw1");
        assert_eq!(info.model_name, "M1");
        assert_eq!(info.firmware_version, "1.0");
        assert_eq!(info.num_ports, 24);
        assert!(info.is_digital_twin);
    }

    #[test]
    fn system_state_tolerates_no_cards_and_missing_fields() {
        let state: SystemState = serde_json::from_str(r#"{"sysName": "bare"}"#).unwrap();
        let info = state.into_info();
        assert_eq!(info.sys_name, "bare");
        assert_eq!(info.model_name, "");
        assert_eq!(info.num_ports, 0);
    }

    #[test]
    fn debug_upload_request_uses_wire_field_names() {
        let request = DebugUploadRequest {
            url: "http://mgmt:9301/api/v1/upload/schema/1-99".to_string(),
            info_type: vec!["OPENAPI_SCHEMA".to_string()],
            username: "upload".to_string(),
            password: "p".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("URL").is_some());
        assert!(json.get("infoType").is_some());
    }
}
