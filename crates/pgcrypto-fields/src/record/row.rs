//! The storage-side shape of a record.

use std::collections::BTreeMap;

use crate::crypto::EncryptedValue;
use crate::field::PlainValue;

/// Primary key assigned by a [`crate::Table`].
pub type RecordId = u64;

/// One persisted column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Null,
    Plain(PlainValue),
    Encrypted(EncryptedValue),
}

impl StoredValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StoredValue::Null)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, StoredValue::Encrypted(_))
    }
}

/// Column name → stored value, as a relational row would hold it.
pub type Row = BTreeMap<String, StoredValue>;
