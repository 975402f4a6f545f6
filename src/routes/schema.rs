//! Schema retrieval endpoints.
//!
//! - `POST /api/v1/switches/{id}/fetch-schema` — ask the switch to push its
//!   OpenAPI schema bundle to this server (Phase A).
//! - `GET  /api/v1/switches/{id}/schema`       — download the stored schema.
//! - `POST /api/v1/upload/schema/{token}`      — inbound callback the switch
//!   pushes the bundle to (Phase B). Public: gated by the single-use token,
//!   not by the API key. Accepts a multipart `file` field or a raw body.

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::schema::SchemaError;
use crate::state::AppState;

fn not_found(msg: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": msg, "code": "NOT_FOUND"})),
    )
}

/// `POST /api/v1/switches/{id}/fetch-schema` — trigger Phase A.
///
/// # Error codes
///
/// | HTTP | Code           | Meaning                                     |
/// |------|----------------|---------------------------------------------|
/// | 404  | `NOT_FOUND`    | Unknown switch id                           |
/// | 502  | `DEVICE_ERROR` | Switch unreachable or rejected the request  |
pub async fn fetch_schema(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.schemas.request_schema(id).await {
        Ok(token) => Ok(Json(json!({
            "message": "Schema fetch requested. The switch will upload the schema shortly.",
            "token": token,
        }))),
        Err(SchemaError::DeviceNotFound | SchemaError::UnknownToken) => {
            Err(not_found("Switch not found"))
        }
        Err(SchemaError::Device(e)) => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": format!("Failed to request schema: {e}"),
                "code": "DEVICE_ERROR",
            })),
        )),
    }
}

/// `GET /api/v1/switches/{id}/schema` — download the stored schema as a
/// YAML attachment.
pub async fn download_schema(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let Some(device) = state.registry.get(id).await else {
        return Err(not_found("Switch not found"));
    };
    let Some(schema) = device.schema else {
        return Err(not_found("No schema available. Fetch it first."));
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-yaml".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=openapi-{}.yaml", device.display_name),
            ),
        ],
        schema,
    )
        .into_response())
}

/// `POST /api/v1/upload/schema/{token}` — inbound callback (Phase B).
///
/// The payload is either a multipart upload (first `file` field wins) or the
/// raw request body. A missing or already-consumed token answers 404; the
/// upload itself is accepted at most once per token.
pub async fn upload_schema(
    State(state): State<AppState>,
    Path(token): Path<String>,
    request: Request,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let payload = read_payload(&state, request).await?;

    match state.schemas.receive_upload(&token, &payload).await {
        Ok(_) => Ok(Json(json!({"message": "Schema uploaded successfully"}))),
        Err(SchemaError::UnknownToken) => {
            Err(not_found("Invalid or expired upload token"))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string(), "code": "UPLOAD_FAILED"})),
        )),
    }
}

/// Read the upload payload — multipart `file` field when the content type
/// says so, raw body otherwise.
async fn read_payload(
    state: &AppState,
    request: Request,
) -> Result<Vec<u8>, (StatusCode, Json<Value>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid multipart body: {e}"), "code": "INVALID_UPLOAD"})),
            )
        })?;
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid multipart body: {e}"), "code": "INVALID_UPLOAD"})),
            )
        })? {
            if field.name() == Some("file") {
                let bytes = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": format!("Failed to read upload: {e}"), "code": "INVALID_UPLOAD"})),
                    )
                })?;
                return Ok(bytes.to_vec());
            }
        }
        Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing file field", "code": "INVALID_UPLOAD"})),
        ))
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), state.config.server.max_upload_size)
            .await
            .map_err(|e| {
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({"error": format!("Failed to read upload: {e}"), "code": "UPLOAD_TOO_LARGE"})),
                )
            })?;
        Ok(bytes.to_vec())
    }
}
