//! Record schemas and record instances.
//!
//! # Key dispatch
//!
//! A [`Record`] receives its cipher key once, at construction, as an explicit
//! `Option<CipherKey>` argument:
//!
//! - **Keyed**: plain values are encrypted with the bound key on save, and
//!   sealed values decrypt with it on read.
//! - **Unkeyed**: sealed values stay sealed; reading one needs a key supplied
//!   through a [`crate::QueryContext`], otherwise [`crate::Error::MissingKey`].
//!
//! There is no setter for the key. Re-keying means building a new record and
//! setting its values again.
//!
//! # Registry
//!
//! A [`RecordSchema`] lists its columns once, at definition time;
//! [`RecordSchema::crypto_fields`] is the list of encrypted-field
//! descriptors consulted by records and queries.

pub mod instance;
pub mod row;
pub mod schema;

pub use instance::{KeyState, Record};
pub use row::{RecordId, Row, StoredValue};
pub use schema::{Column, ColumnDefinition, RecordSchema, SchemaBuilder, SchemaError};
