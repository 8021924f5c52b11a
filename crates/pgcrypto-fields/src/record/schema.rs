//! Declarative record schemas: which columns exist and which are encrypted.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::CipherSpec;
use crate::field::{EncryptedField, FieldKind};

/// Errors from building a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema `{schema}` declares column `{column}` twice")]
    DuplicateColumn { schema: String, column: String },

    #[error("schema `{0}` has no columns")]
    Empty(String),
}

/// One column of a [`RecordSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Plain { name: String, kind: FieldKind },
    Encrypted(EncryptedField),
}

impl Column {
    pub fn name(&self) -> &str {
        match self {
            Column::Plain { name, .. } => name,
            Column::Encrypted(field) => field.name(),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Column::Plain { kind, .. } => *kind,
            Column::Encrypted(field) => field.kind(),
        }
    }

    pub fn as_encrypted(&self) -> Option<&EncryptedField> {
        match self {
            Column::Encrypted(field) => Some(field),
            Column::Plain { .. } => None,
        }
    }
}

/// Serialisable column declaration, used to load schemas from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub encrypted: bool,
    /// Overrides the default cipher spec for this column.
    #[serde(default)]
    pub cipher: Option<CipherSpec>,
}

/// The column registry of one record type. Built once and shared via `Arc`.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    columns: Vec<Column>,
}

impl RecordSchema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Build a schema from column declarations, applying `default_spec` to
    /// encrypted columns without their own `cipher`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] on duplicate column names or an empty list.
    pub fn from_definitions(
        name: impl Into<String>,
        definitions: &[ColumnDefinition],
        default_spec: CipherSpec,
    ) -> Result<Arc<Self>, SchemaError> {
        definitions
            .iter()
            .fold(Self::builder(name), |builder, def| {
                if def.encrypted {
                    builder.encrypted(&def.name, def.kind, def.cipher.unwrap_or(default_spec))
                } else {
                    builder.plain(&def.name, def.kind)
                }
            })
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Encrypted-field descriptors in declaration order.
    pub fn crypto_fields(&self) -> impl Iterator<Item = &EncryptedField> {
        self.columns.iter().filter_map(Column::as_encrypted)
    }
}

/// Builder returned by [`RecordSchema::builder`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn plain(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.columns.push(Column::Plain {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn encrypted(mut self, name: impl Into<String>, kind: FieldKind, spec: CipherSpec) -> Self {
        self.columns
            .push(Column::Encrypted(EncryptedField::new(name, kind, spec)));
        self
    }

    /// # Errors
    ///
    /// Returns [`SchemaError`] on duplicate column names or no columns.
    pub fn build(self) -> Result<Arc<RecordSchema>, SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::Empty(self.name));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(SchemaError::DuplicateColumn {
                    schema: self.name.clone(),
                    column: column.name().to_owned(),
                });
            }
        }
        Ok(Arc::new(RecordSchema {
            name: self.name,
            columns: self.columns,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CipherKind;

    fn plain_model() -> Arc<RecordSchema> {
        RecordSchema::builder("plain_model")
            .plain("name", FieldKind::Text)
            .encrypted("encrypted", FieldKind::Text, CipherSpec::default())
            .encrypted("email", FieldKind::Email, CipherSpec::default())
            .build()
            .unwrap()
    }

    #[test]
    fn crypto_fields_in_declaration_order() {
        let schema = plain_model();
        let names: Vec<_> = schema.crypto_fields().map(|f| f.name()).collect();
        assert_eq!(names, ["encrypted", "email"]);
    }

    #[test]
    fn column_lookup() {
        let schema = plain_model();
        assert_eq!(schema.column("name").map(Column::kind), Some(FieldKind::Text));
        assert!(schema.column("name").unwrap().as_encrypted().is_none());
        assert!(schema.column("email").unwrap().as_encrypted().is_some());
        assert!(schema.column("salary").is_none());
    }

    #[test]
    fn duplicate_column_rejected() {
        let err = RecordSchema::builder("t")
            .plain("a", FieldKind::Text)
            .encrypted("a", FieldKind::Text, CipherSpec::default())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateColumn {
                schema: "t".into(),
                column: "a".into()
            }
        );
    }

    #[test]
    fn empty_schema_rejected() {
        assert_eq!(
            RecordSchema::builder("t").build().unwrap_err(),
            SchemaError::Empty("t".into())
        );
    }

    #[test]
    fn from_definitions_applies_default_spec() {
        let defs: Vec<ColumnDefinition> = serde_json::from_str(
            r#"[
                {"name": "name", "kind": "text"},
                {"name": "ssn", "kind": "text", "encrypted": true},
                {"name": "salary", "kind": "decimal", "encrypted": true,
                 "cipher": {"cipher": "aes", "armor": false}}
            ]"#,
        )
        .unwrap();
        let default_spec = CipherSpec::new(CipherKind::Blowfish).with_version(true);
        let schema = RecordSchema::from_definitions("employee", &defs, default_spec).unwrap();

        assert_eq!(schema.name(), "employee");
        assert_eq!(schema.columns().len(), 3);
        let specs: Vec<_> = schema.crypto_fields().map(|f| f.spec()).collect();
        assert_eq!(
            specs,
            [
                default_spec,
                CipherSpec::new(CipherKind::Aes).with_armor(false)
            ]
        );
    }
}
