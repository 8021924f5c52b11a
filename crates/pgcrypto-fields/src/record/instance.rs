//! [`Record`]: one instance of a [`RecordSchema`] with its bound cipher key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::row::{RecordId, Row, StoredValue};
use super::schema::{Column, RecordSchema};
use crate::crypto::{armor, EncryptedValue};
use crate::error::{Error, Result};
use crate::field::{PlainValue, ValueFormatError};
use crate::key::CipherKey;
use crate::query::QueryContext;

/// Whether a record was constructed with a cipher key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Keyed,
    Unkeyed,
}

#[derive(Clone, PartialEq, Eq)]
enum Slot {
    Null,
    Plain(PlainValue),
    /// Ciphertext not yet decrypted, because no key was available on load.
    Sealed(EncryptedValue),
}

/// A record instance.
///
/// The key is fixed at construction; see the [module docs](super) for the
/// keyed/unkeyed life cycle. Values are held in plaintext once set or
/// decrypted, and encrypted only when converted to a [`Row`].
#[derive(Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    id: Option<RecordId>,
    cipher_key: Option<CipherKey>,
    slots: BTreeMap<String, Slot>,
}

impl Record {
    /// A new, unsaved record with every column null.
    pub fn new(schema: Arc<RecordSchema>, cipher_key: Option<CipherKey>) -> Self {
        let slots = schema
            .columns()
            .iter()
            .map(|c| (c.name().to_owned(), Slot::Null))
            .collect();
        Self {
            schema,
            id: None,
            cipher_key,
            slots,
        }
    }

    pub fn keyed(schema: Arc<RecordSchema>, cipher_key: impl Into<CipherKey>) -> Self {
        Self::new(schema, Some(cipher_key.into()))
    }

    pub fn unkeyed(schema: Arc<RecordSchema>) -> Self {
        Self::new(schema, None)
    }

    /// A new record with the given values set.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownField`] or [`Error::ValueFormat`] from [`Record::set`].
    pub fn with_values<I, K, V>(
        schema: Arc<RecordSchema>,
        cipher_key: Option<CipherKey>,
        values: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<PlainValue>,
    {
        let mut record = Self::new(schema, cipher_key);
        for (field, value) in values {
            record.set(field.as_ref(), value)?;
        }
        Ok(record)
    }

    /// Rebuild a record from a stored row, binding `cipher_key`.
    ///
    /// Encrypted columns stay sealed until [`Record::unseal`] or a read.
    /// Plain text found in an encrypted column that is not an armored
    /// message is taken as a legacy plaintext value.
    ///
    /// # Errors
    ///
    /// [`Error::ValueFormat`] if a stored plain value has the wrong kind.
    pub fn from_row(
        schema: Arc<RecordSchema>,
        id: Option<RecordId>,
        row: &Row,
        cipher_key: Option<CipherKey>,
    ) -> Result<Self> {
        let mut slots = BTreeMap::new();
        for column in schema.columns() {
            let stored = row.get(column.name()).unwrap_or(&StoredValue::Null);
            let slot = match (column, stored) {
                (_, StoredValue::Null) => Slot::Null,
                (Column::Encrypted(_), StoredValue::Encrypted(value)) => Slot::Sealed(value.clone()),
                (Column::Encrypted(_), StoredValue::Plain(PlainValue::Text(text)))
                    if armor::is_encrypted(text) =>
                {
                    Slot::Sealed(EncryptedValue::Armored(text.clone()))
                }
                (Column::Plain { kind, .. }, StoredValue::Encrypted(_)) => {
                    return Err(ValueFormatError::KindMismatch { expected: *kind }.into());
                }
                (column, StoredValue::Plain(value)) => {
                    column.kind().check(value)?;
                    Slot::Plain(value.clone())
                }
            };
            slots.insert(column.name().to_owned(), slot);
        }
        Ok(Self {
            schema,
            id,
            cipher_key,
            slots,
        })
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub fn key_state(&self) -> KeyState {
        if self.cipher_key.is_some() {
            KeyState::Keyed
        } else {
            KeyState::Unkeyed
        }
    }

    pub(crate) fn cipher_key(&self) -> Option<&CipherKey> {
        self.cipher_key.as_ref()
    }

    /// Set a column to a plaintext value.
    ///
    /// Text that is already an armored message, set on an encrypted column,
    /// is kept sealed and written back as-is instead of being encrypted a
    /// second time.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownField`] if the column does not exist,
    /// [`Error::ValueFormat`] if `value` has the wrong kind.
    pub fn set(&mut self, field: &str, value: impl Into<PlainValue>) -> Result<()> {
        let value = value.into();
        let column = self.column(field)?;
        let slot = match (column, value) {
            (Column::Encrypted(_), PlainValue::Text(text)) if armor::is_encrypted(&text) => {
                Slot::Sealed(EncryptedValue::Armored(text))
            }
            (column, value) => {
                column.kind().check(&value)?;
                Slot::Plain(value)
            }
        };
        self.slots.insert(field.to_owned(), slot);
        Ok(())
    }

    /// Set a column to null.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownField`] if the column does not exist.
    pub fn clear(&mut self, field: &str) -> Result<()> {
        self.column(field)?;
        self.slots.insert(field.to_owned(), Slot::Null);
        Ok(())
    }

    /// Read a column, decrypting with the bound key if it is still sealed.
    ///
    /// # Errors
    ///
    /// [`Error::MissingKey`] for a sealed column on an unkeyed record, or any
    /// decryption error.
    pub fn get(&self, field: &str) -> Result<Option<PlainValue>> {
        self.read(field, self.cipher_key.as_ref())
    }

    /// Read a column using the context's key, if it carries one, for this
    /// call only. Falls back to the bound key.
    ///
    /// # Errors
    ///
    /// As [`Record::get`].
    pub fn get_with(&self, field: &str, ctx: &QueryContext) -> Result<Option<PlainValue>> {
        self.read(field, ctx.resolve(self.cipher_key.as_ref()))
    }

    /// Whether a column still holds undecrypted ciphertext.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownField`] if the column does not exist.
    pub fn is_sealed(&self, field: &str) -> Result<bool> {
        self.column(field)?;
        Ok(matches!(self.slots.get(field), Some(Slot::Sealed(_))))
    }

    /// Decrypt every sealed column with the bound key. A no-op when unkeyed.
    ///
    /// All-or-nothing: on error the record is left as it was.
    ///
    /// # Errors
    ///
    /// Any decryption or value-format error.
    pub fn unseal(&mut self) -> Result<()> {
        let Some(key) = self.cipher_key.as_ref() else {
            return Ok(());
        };
        let mut opened = Vec::new();
        for field in self.schema.crypto_fields() {
            if let Some(Slot::Sealed(value)) = self.slots.get(field.name()) {
                opened.push((field.name().to_owned(), field.from_storage(value, key)?));
            }
        }
        trace!(schema = %self.schema.name(), fields = opened.len(), "unsealed record");
        for (name, value) in opened {
            self.slots.insert(name, Slot::Plain(value));
        }
        Ok(())
    }

    /// Convert to the stored form, encrypting plaintext values of encrypted
    /// columns with the bound key. Sealed values are written back unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::MissingKey`] if an encrypted column holds plaintext and the
    /// record is unkeyed.
    pub fn to_row(&self) -> Result<Row> {
        let mut row = Row::new();
        for column in self.schema.columns() {
            let name = column.name();
            let stored = match (column, self.slots.get(name).unwrap_or(&Slot::Null)) {
                (_, Slot::Null) => StoredValue::Null,
                (_, Slot::Sealed(value)) => StoredValue::Encrypted(value.clone()),
                (Column::Plain { .. }, Slot::Plain(value)) => StoredValue::Plain(value.clone()),
                (Column::Encrypted(field), Slot::Plain(value)) => {
                    let key = self
                        .cipher_key
                        .as_ref()
                        .ok_or_else(|| Error::missing_key(name))?;
                    StoredValue::Encrypted(field.to_storage(value, key)?)
                }
            };
            row.insert(name.to_owned(), stored);
        }
        Ok(row)
    }

    fn column(&self, field: &str) -> Result<&Column> {
        self.schema
            .column(field)
            .ok_or_else(|| Error::unknown_field(field))
    }

    fn read(&self, field: &str, key: Option<&CipherKey>) -> Result<Option<PlainValue>> {
        let column = self.column(field)?;
        match self.slots.get(field).unwrap_or(&Slot::Null) {
            Slot::Null => Ok(None),
            Slot::Plain(value) => Ok(Some(value.clone())),
            Slot::Sealed(value) => {
                let key = key.ok_or_else(|| Error::missing_key(field))?;
                let encrypted = column
                    .as_encrypted()
                    .ok_or_else(|| Error::unknown_field(field))?;
                encrypted.from_storage(value, key).map(Some)
            }
        }
    }
}

impl fmt::Debug for Record {
    // Field values are omitted: they are plaintext.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("schema", &self.schema.name())
            .field("id", &self.id)
            .field("key_state", &self.key_state())
            .field("fields", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}
