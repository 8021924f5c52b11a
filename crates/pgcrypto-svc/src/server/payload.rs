//! Conversions between JSON payloads and records or stored rows.
//!
//! Plain payloads carry native JSON values: strings for text-like kinds and
//! dates, numbers or numeric strings for decimals. Stored payloads carry
//! armored text for armored columns and base64 for raw ones. Every output
//! value is a string, so decimals keep their exact scale.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pgcrypto_fields::crypto::is_encrypted;
use pgcrypto_fields::field::ValueFormatError;
use pgcrypto_fields::record::Column;
use pgcrypto_fields::{
    CipherKey, EncryptedValue, Error, FieldKind, PlainValue, Record, RecordSchema, Row,
    StoredValue,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors mapping a payload onto a schema.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("column `{column}` is not valid base64 ciphertext")]
    InvalidBase64 { column: String },

    #[error(transparent)]
    Field(#[from] Error),
}

impl From<ValueFormatError> for PayloadError {
    fn from(e: ValueFormatError) -> Self {
        PayloadError::Field(e.into())
    }
}

/// Unwrap the top-level payload object.
///
/// # Errors
///
/// [`PayloadError::NotAnObject`] for any other JSON value.
pub fn object(payload: Value) -> Result<Map<String, Value>, PayloadError> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(PayloadError::NotAnObject),
    }
}

/// Parse a native JSON value as `kind`. `null` maps to `None`.
pub fn plain_from_json(kind: FieldKind, value: &Value) -> Result<Option<PlainValue>, ValueFormatError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => kind.deserialize(text).map(Some),
        Value::Number(n) if kind == FieldKind::Decimal => kind.deserialize(&n.to_string()).map(Some),
        _ => Err(ValueFormatError::Malformed { kind }),
    }
}

/// Build a record bound to `cipher_key` from a plain payload.
///
/// An armored message given for an encrypted column is kept as it is.
///
/// # Errors
///
/// Unknown columns and malformed values.
pub fn record_from_plain(
    schema: &Arc<RecordSchema>,
    cipher_key: Option<CipherKey>,
    payload: &Map<String, Value>,
) -> Result<Record, PayloadError> {
    let mut record = Record::new(Arc::clone(schema), cipher_key);
    for (name, value) in payload {
        match (column(schema, name)?, value) {
            (Column::Encrypted(_), Value::String(text)) if is_encrypted(text) => {
                record.set(name, PlainValue::Text(text.clone()))?;
            }
            (column, value) => {
                if let Some(value) = plain_from_json(column.kind(), value)? {
                    record.set(name, value)?;
                }
            }
        }
    }
    Ok(record)
}

/// Render a stored row as a stored payload.
///
/// # Errors
///
/// [`Error::ValueFormat`] if a plain value does not match its column.
pub fn row_to_json(schema: &RecordSchema, row: &Row) -> Result<Map<String, Value>, PayloadError> {
    let mut out = Map::new();
    for (name, stored) in row {
        let value = match stored {
            StoredValue::Null => Value::Null,
            StoredValue::Plain(value) => Value::String(column(schema, name)?.kind().serialize(value)?),
            StoredValue::Encrypted(EncryptedValue::Armored(text)) => Value::String(text.clone()),
            StoredValue::Encrypted(EncryptedValue::Raw(bytes)) => Value::String(STANDARD.encode(bytes)),
        };
        out.insert(name.clone(), value);
    }
    Ok(out)
}

/// Parse a stored payload into a row.
///
/// In an armored encrypted column, a string that is not an armored message
/// is taken as legacy plaintext. Raw encrypted columns must hold base64.
///
/// # Errors
///
/// Unknown columns, malformed values and invalid base64.
pub fn row_from_json(schema: &RecordSchema, payload: &Map<String, Value>) -> Result<Row, PayloadError> {
    let mut row = Row::new();
    for (name, value) in payload {
        let column = column(schema, name)?;
        let stored = match (column, value) {
            (_, Value::Null) => StoredValue::Null,
            (Column::Encrypted(_), Value::String(text)) if is_encrypted(text) => {
                StoredValue::Encrypted(EncryptedValue::Armored(text.clone()))
            }
            (Column::Encrypted(field), Value::String(text)) if !field.spec().armor => {
                let bytes = STANDARD
                    .decode(text)
                    .map_err(|_| PayloadError::InvalidBase64 {
                        column: name.clone(),
                    })?;
                StoredValue::Encrypted(EncryptedValue::Raw(bytes))
            }
            (column, value) => match plain_from_json(column.kind(), value)? {
                Some(value) => StoredValue::Plain(value),
                None => StoredValue::Null,
            },
        };
        row.insert(name.clone(), stored);
    }
    Ok(row)
}

/// Render every column of a record as a plain payload.
///
/// # Errors
///
/// Any error reading a column, e.g. [`Error::MissingKey`] for a sealed
/// column of an unkeyed record.
pub fn record_to_json(record: &Record) -> Result<Map<String, Value>, PayloadError> {
    let mut out = Map::new();
    for column in record.schema().columns() {
        let value = match record.get(column.name())? {
            Some(value) => Value::String(column.kind().serialize(&value)?),
            None => Value::Null,
        };
        out.insert(column.name().to_owned(), value);
    }
    Ok(out)
}

fn column<'a>(schema: &'a RecordSchema, name: &str) -> Result<&'a Column, PayloadError> {
    schema.column(name).ok_or_else(|| {
        Error::UnknownField {
            field: name.to_owned(),
        }
        .into()
    })
}
