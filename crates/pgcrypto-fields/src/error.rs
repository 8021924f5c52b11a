//! Crate-level error type.
//!
//! Every variant is a recoverable, caller-local condition: a failed operation
//! leaves the record or field it was applied to unchanged. Messages never
//! include key material or plaintext values.

use thiserror::Error;

use crate::crypto::{CipherKind, DecryptionError};
use crate::field::ValueFormatError;
use crate::record::RecordId;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by field, record and query operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The cipher rejected the derived key (Blowfish needs 4..=56 bytes).
    #[error("invalid {cipher} key length: {len} bytes")]
    InvalidKeyLength { cipher: CipherKind, len: usize },

    /// The stored value is structurally malformed (armor or padding).
    ///
    /// A wrong key does **not** produce this error reliably; see the crate docs.
    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    /// A plain value could not be converted to or from its textual form.
    #[error(transparent)]
    ValueFormat(#[from] ValueFormatError),

    /// An encrypted field was accessed with neither a record-bound nor a
    /// query-supplied key.
    #[error("no cipher key available for encrypted field `{field}`")]
    MissingKey { field: String },

    /// The schema declares no column with this name.
    #[error("unknown field `{field}`")]
    UnknownField { field: String },

    /// No stored row has this id.
    #[error("record {id} not found")]
    NotFound { id: RecordId },

    /// A record was saved to a table of a different schema.
    #[error("record of schema `{found}` does not belong in `{expected}`")]
    SchemaMismatch { expected: String, found: String },
}

impl Error {
    pub(crate) fn missing_key(field: &str) -> Self {
        Error::MissingKey {
            field: field.to_owned(),
        }
    }

    pub(crate) fn unknown_field(field: &str) -> Self {
        Error::UnknownField {
            field: field.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PaddingError;

    #[test]
    fn missing_key_names_field_only() {
        let e = Error::missing_key("ssn");
        assert_eq!(e.to_string(), "no cipher key available for encrypted field `ssn`");
    }

    #[test]
    fn decryption_error_is_transparent() {
        let e: Error = DecryptionError::Padding(PaddingError::InvalidPadByte(0)).into();
        assert!(e.to_string().contains("padding"), "{e}");
    }

    #[test]
    fn key_length_message_has_no_key_bytes() {
        let e = Error::InvalidKeyLength {
            cipher: CipherKind::Blowfish,
            len: 2,
        };
        assert_eq!(e.to_string(), "invalid bf key length: 2 bytes");
    }
}
