//! Service-level error type.

use thiserror::Error;

/// Errors returned by the HTTP surface.
///
/// | variant       | status | code          |
/// |---------------|--------|---------------|
/// | `BadRequest`  | 400    | `bad_request` |
/// | `Unavailable` | 503    | `unavailable` |
/// | `Internal`    | 500    | `internal`    |
///
/// Messages are returned to callers verbatim and must never carry key bytes
/// or field values.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed header, unknown schema, bad payload, a key the
    /// cipher rejects, or a stored value that does not decrypt.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Schemas have not been loaded yet.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Machine-readable code for [`crate::protocol::ErrorResponse::code`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Internal(_) => "internal",
        }
    }
}
