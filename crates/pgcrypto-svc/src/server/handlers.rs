//! Axum request handlers for all service endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, ErrorResponse,
    HealthResponse,
};
use common::ServiceError;
use pgcrypto_fields::{CipherKey, QueryContext, RecordSchema};
use serde_json::Value;
use tracing::{debug, warn};

use super::payload::{self, PayloadError};
use super::state::AppState;

/// A [`ServiceError`] rendered as a JSON [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError(e)
    }
}

/// Every library error stems from the request: its payload, its headers or
/// the key it supplied.
impl From<pgcrypto_fields::Error> for ApiError {
    fn from(e: pgcrypto_fields::Error) -> Self {
        if let pgcrypto_fields::Error::InvalidKeyLength { cipher, len } = &e {
            warn!(?cipher, len, "cipher rejected key");
        }
        ApiError(ServiceError::BadRequest(e.to_string()))
    }
}

impl From<PayloadError> for ApiError {
    fn from(e: PayloadError) -> Self {
        match e {
            PayloadError::Field(inner) => inner.into(),
            other => ApiError(ServiceError::BadRequest(other.to_string())),
        }
    }
}

/// `POST /encrypt`: replace every encrypted column of a plain payload with
/// its storage form.
///
/// The schema comes from the schema header; the key, base64-encoded, from
/// the key header. The key may be omitted when no encrypted column is set.
pub async fn encrypt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EncryptRequest>,
) -> Result<Json<EncryptResponse>, ApiError> {
    let schema = resolve_schema(&state, &headers)?;
    let cipher_key = cipher_key(&state, &headers)?;

    let plain = payload::object(req.payload)?;
    let record = payload::record_from_plain(&schema, cipher_key, &plain)?;
    let row = record.to_row()?;
    let stored = payload::row_to_json(&schema, &row)?;

    debug!(schema = %schema.name(), key_state = ?record.key_state(), "payload encrypted");
    Ok(Json(EncryptResponse {
        payload: Value::Object(stored),
    }))
}

/// `POST /decrypt`: decrypt every encrypted column of a stored payload with
/// the key from the key header.
///
/// Legacy plaintext in encrypted columns is passed through. A wrong key
/// either fails or yields garbage; there is no integrity check to tell.
pub async fn decrypt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DecryptRequest>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let schema = resolve_schema(&state, &headers)?;
    let context = match cipher_key(&state, &headers)? {
        Some(cipher_key) => QueryContext::with_key(cipher_key),
        None => QueryContext::new(),
    };

    let stored = payload::object(req.payload)?;
    let row = payload::row_from_json(&schema, &stored)?;
    let record = context.load(&schema, None, &row)?;
    let plain = payload::record_to_json(&record)?;

    debug!(schema = %schema.name(), key_state = ?record.key_state(), "payload decrypted");
    Ok(Json(DecryptResponse {
        payload: Value::Object(plain),
    }))
}

/// `GET /health`: `200 OK` once at least one schema is loaded, otherwise
/// `503 Service Unavailable`.
pub async fn health(State(state): State<AppState>) -> Response {
    let schemas_loaded = state.schema_cache.len();

    let (status_code, status_str) = if schemas_loaded > 0 {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        schemas_loaded,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, ServiceError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map(|s| s.trim().to_owned())
                .map_err(|_| ServiceError::BadRequest(format!("{name} header contains non-ASCII characters")))
        })
        .transpose()
}

fn resolve_schema(state: &AppState, headers: &HeaderMap) -> Result<Arc<RecordSchema>, ServiceError> {
    let name = header_value(headers, &state.schema_header_name)?
        .ok_or_else(|| ServiceError::BadRequest(format!("missing {} header", state.schema_header_name)))?;

    state.schema_cache.get(&name).map_err(|e| {
        if state.schema_cache.is_empty() {
            ServiceError::Unavailable("no schemas loaded".into())
        } else {
            ServiceError::BadRequest(e.to_string())
        }
    })
}

/// Decode the optional base64 key header. The header text itself is never
/// echoed back.
fn cipher_key(state: &AppState, headers: &HeaderMap) -> Result<Option<CipherKey>, ServiceError> {
    let name = state.key_header_name.as_str();
    header_value(headers, name)?
        .map(|encoded| {
            STANDARD
                .decode(encoded)
                .map(CipherKey::from)
                .map_err(|_| ServiceError::BadRequest(format!("{name} header is not valid base64")))
        })
        .transpose()
}
