//! Per-record field encryption compatible with the PostgreSQL `pgcrypto`
//! extension's `encrypt()` / `armor()` output.
//!
//! Values encrypted here can be decrypted inside the database with
//! `decrypt(dearmor(col), key, 'bf')` (or `'aes'`) and vice versa.
//!
//! # Layers
//!
//! - [`crypto`]: padding, armor, key derivation and the cipher envelope.
//! - [`field`]: typed values and the per-kind (de)serialisation applied
//!   around the envelope.
//! - [`record`]: the declarative schema registry and record instances that
//!   carry a construction-time [`CipherKey`].
//! - [`query`]: the per-query [`QueryContext`] and an in-memory [`Table`].
//!
//! # Security notes
//!
//! The format has no MAC and uses a fixed all-zero IV. Decrypting with the
//! wrong key yields garbage rather than an error, and equal plaintexts under
//! the same key produce equal ciphertexts. Both properties are part of the
//! legacy wire format.

pub mod crypto;
pub mod error;
pub mod field;
pub mod key;
pub mod query;
pub mod record;

pub use crypto::{CipherKind, CipherSpec, EncryptedValue, Envelope};
pub use error::{Error, Result};
pub use field::{EncryptedField, FieldKind, PlainValue};
pub use key::CipherKey;
pub use query::{Query, QueryContext, Table};
pub use record::{KeyState, Record, RecordId, RecordSchema, Row, StoredValue};
