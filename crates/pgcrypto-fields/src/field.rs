//! Typed field values and the encrypted-field engine.
//!
//! The value kind ([`FieldKind`]) and the cipher ([`CipherSpec`]) are chosen
//! independently: an [`EncryptedField`] pairs one of each.
//!
//! Canonical text forms, which are what actually gets encrypted:
//!
//! | kind      | form                          |
//! |-----------|-------------------------------|
//! | `text`    | the string itself             |
//! | `email`   | the string itself             |
//! | `decimal` | fixed-point, e.g. `75248.77`  |
//! | `date`    | ISO-8601, e.g. `1999-01-23`   |

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{CipherSpec, EncryptedValue, Envelope};
use crate::error::Result;
use crate::key::CipherKey;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Scalar kinds a column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Decimal,
    Date,
    /// Text; address validation is left to the caller.
    Email,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::Text => "text",
            FieldKind::Decimal => "decimal",
            FieldKind::Date => "date",
            FieldKind::Email => "email",
        })
    }
}

/// A logical value before encryption or after decryption.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlainValue {
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl From<&str> for PlainValue {
    fn from(s: &str) -> Self {
        PlainValue::Text(s.to_owned())
    }
}

impl From<String> for PlainValue {
    fn from(s: String) -> Self {
        PlainValue::Text(s)
    }
}

impl From<Decimal> for PlainValue {
    fn from(d: Decimal) -> Self {
        PlainValue::Decimal(d)
    }
}

impl From<i32> for PlainValue {
    fn from(n: i32) -> Self {
        PlainValue::Decimal(Decimal::from(n))
    }
}

impl From<i64> for PlainValue {
    fn from(n: i64) -> Self {
        PlainValue::Decimal(Decimal::from(n))
    }
}

impl From<NaiveDate> for PlainValue {
    fn from(d: NaiveDate) -> Self {
        PlainValue::Date(d)
    }
}

/// Errors converting between a [`PlainValue`] and its text form.
///
/// Messages name the kind only, never the offending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValueFormatError {
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed {kind} value")]
    Malformed { kind: FieldKind },

    #[error("expected a {expected} value")]
    KindMismatch { expected: FieldKind },
}

impl FieldKind {
    /// Whether `value` is a valid native value for this kind.
    pub fn accepts(self, value: &PlainValue) -> bool {
        matches!(
            (self, value),
            (FieldKind::Text | FieldKind::Email, PlainValue::Text(_))
                | (FieldKind::Decimal, PlainValue::Decimal(_))
                | (FieldKind::Date, PlainValue::Date(_))
        )
    }

    /// Fail with [`ValueFormatError::KindMismatch`] unless [`Self::accepts`].
    pub fn check(self, value: &PlainValue) -> Result<(), ValueFormatError> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(ValueFormatError::KindMismatch { expected: self })
        }
    }

    /// Canonical text form of `value`.
    pub fn serialize(self, value: &PlainValue) -> Result<String, ValueFormatError> {
        self.check(value)?;
        Ok(match value {
            PlainValue::Text(s) => s.clone(),
            PlainValue::Decimal(d) => d.to_string(),
            PlainValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        })
    }

    /// Parse a canonical text form back into a native value.
    pub fn deserialize(self, text: &str) -> Result<PlainValue, ValueFormatError> {
        let malformed = ValueFormatError::Malformed { kind: self };
        match self {
            FieldKind::Text | FieldKind::Email => Ok(PlainValue::Text(text.to_owned())),
            FieldKind::Decimal => {
                let text = text.trim();
                Decimal::from_str(text)
                    .or_else(|_| Decimal::from_scientific(text))
                    .map(PlainValue::Decimal)
                    .map_err(|_| malformed)
            }
            FieldKind::Date => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map(PlainValue::Date)
                .map_err(|_| malformed),
        }
    }
}

/// Descriptor for one encrypted column: name, value kind and cipher.
///
/// Holds no mutable state; one instance serves every record of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    name: String,
    kind: FieldKind,
    envelope: Envelope,
}

impl EncryptedField {
    pub fn new(name: impl Into<String>, kind: FieldKind, spec: CipherSpec) -> Self {
        Self {
            name: name.into(),
            kind,
            envelope: Envelope::new(spec),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn spec(&self) -> CipherSpec {
        self.envelope.spec()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Serialise then encrypt `value` for storage.
    ///
    /// # Errors
    ///
    /// [`crate::Error::ValueFormat`] on a kind mismatch,
    /// [`crate::Error::InvalidKeyLength`] if the cipher rejects the key.
    pub fn to_storage(&self, value: &PlainValue, key: &CipherKey) -> Result<EncryptedValue> {
        let text = self.kind.serialize(value)?;
        self.envelope.encrypt(text.as_bytes(), key)
    }

    /// Decrypt then deserialise a stored value.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Decryption`] on structural failures,
    /// [`crate::Error::ValueFormat`] if the plaintext does not parse as this
    /// field's kind (typical of a wrong key).
    pub fn from_storage(&self, value: &EncryptedValue, key: &CipherKey) -> Result<PlainValue> {
        let bytes = self.envelope.decrypt(value, key)?;
        let text = String::from_utf8(bytes).map_err(|_| ValueFormatError::InvalidUtf8)?;
        Ok(self.kind.deserialize(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CipherKind;
    use crate::Error;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(FieldKind::Text, PlainValue::from("OneTwo"), "OneTwo")]
    #[case(FieldKind::Email, PlainValue::from("a@example.com"), "a@example.com")]
    #[case(FieldKind::Decimal, PlainValue::from(2000), "2000")]
    #[case(FieldKind::Decimal, PlainValue::Decimal(Decimal::new(7524877, 2)), "75248.77")]
    #[case(FieldKind::Date, PlainValue::from(date(1999, 1, 23)), "1999-01-23")]
    fn canonical_forms(#[case] kind: FieldKind, #[case] value: PlainValue, #[case] text: &str) {
        assert_eq!(kind.serialize(&value).unwrap(), text);
        assert_eq!(kind.deserialize(text).unwrap(), value);
    }

    #[test]
    fn decimal_accepts_scientific_notation() {
        assert_eq!(
            FieldKind::Decimal.deserialize("1.5e3").unwrap(),
            PlainValue::Decimal(Decimal::from(1500))
        );
    }

    #[rstest]
    #[case(FieldKind::Decimal, "two thousand")]
    #[case(FieldKind::Date, "1999-13-01")]
    #[case(FieldKind::Date, "23/01/1999")]
    fn malformed_text_rejected(#[case] kind: FieldKind, #[case] text: &str) {
        assert_eq!(
            kind.deserialize(text),
            Err(ValueFormatError::Malformed { kind })
        );
    }

    #[test]
    fn kind_mismatch_rejected() {
        assert_eq!(
            FieldKind::Date.serialize(&PlainValue::from("1999-01-23")),
            Err(ValueFormatError::KindMismatch {
                expected: FieldKind::Date
            })
        );
        assert!(FieldKind::Email.accepts(&PlainValue::from("x")));
        assert!(!FieldKind::Text.accepts(&PlainValue::from(1)));
    }

    #[rstest]
    #[case(FieldKind::Text, PlainValue::from("OneTwo"))]
    #[case(FieldKind::Decimal, PlainValue::from(2000))]
    #[case(FieldKind::Date, PlainValue::from(date(1981, 6, 2)))]
    fn storage_round_trip(#[case] kind: FieldKind, #[case] value: PlainValue) {
        let key = CipherKey::from("1234");
        for cipher in [CipherKind::Blowfish, CipherKind::Aes] {
            let field = EncryptedField::new("f", kind, CipherSpec::new(cipher));
            let stored = field.to_storage(&value, &key).unwrap();
            assert!(field.envelope().is_encrypted(&stored));
            assert_eq!(field.from_storage(&stored, &key).unwrap(), value);
        }
    }

    #[test]
    fn wrong_key_does_not_reproduce_value() {
        let field = EncryptedField::new("salary", FieldKind::Decimal, CipherSpec::default());
        let stored = field
            .to_storage(&PlainValue::from(2000), &CipherKey::from("1234"))
            .unwrap();
        match field.from_storage(&stored, &CipherKey::from("abcd")) {
            Ok(value) => assert_ne!(value, PlainValue::from(2000)),
            Err(e) => assert!(
                matches!(e, Error::Decryption(_) | Error::ValueFormat(_)),
                "{e}"
            ),
        }
    }
}
