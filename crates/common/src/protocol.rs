//! JSON bodies of the `pgcrypto-svc` HTTP API.
//!
//! The record schema is named by a request header, the cipher key travels
//! base64-encoded in another; neither appears in a body.

use serde::{Deserialize, Serialize};

/// Request body for `POST /encrypt`.
///
/// `payload` is a flat object of column name to plain JSON value: strings
/// for `text`/`email`, numbers or numeric strings for `decimal`, ISO-8601
/// strings for `date`, `null` for null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub payload: serde_json::Value,
}

/// Response body for `POST /encrypt`.
///
/// Encrypted columns carry their storage form: the armored message, or the
/// base64 of the raw ciphertext when the column is not armored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub payload: serde_json::Value,
}

/// Request body for `POST /decrypt`, shaped like an [`EncryptResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub payload: serde_json::Value,
}

/// Response body for `POST /decrypt`, shaped like an [`EncryptRequest`].
///
/// Decimals come back as strings to keep their exact scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub payload: serde_json::Value,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` while no schema is loaded.
    pub status: String,
    pub schemas_loaded: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encrypt_request_from_json() {
        let req: EncryptRequest =
            serde_json::from_str(r#"{"payload": {"name": "example", "salary": 2000}}"#).unwrap();
        assert_eq!(req.payload["name"], "example");
        assert_eq!(req.payload["salary"], 2000);
    }

    #[test]
    fn decrypt_response_to_json() {
        let resp = DecryptResponse {
            payload: json!({"ssn": "OneTwo", "salary": "2000"}),
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"payload": {"ssn": "OneTwo", "salary": "2000"}}));
    }

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("bad_request", "missing schema header");
        assert_eq!(e.code, "bad_request");
        assert_eq!(e.message, "missing schema header");
    }

    #[test]
    fn health_response_fields() {
        let h: HealthResponse =
            serde_json::from_str(r#"{"status": "ok", "schemas_loaded": 3}"#).unwrap();
        assert_eq!(h.status, "ok");
        assert_eq!(h.schemas_loaded, 3);
    }
}
