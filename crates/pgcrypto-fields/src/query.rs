//! Per-query key context and an in-memory table.
//!
//! [`QueryContext`] is threaded explicitly through every read; there is no
//! ambient "current key". A query binds the one key it carries to every
//! record it returns; rows stored under other keys stay sealed and fail only
//! when their encrypted columns are read.
//!
//! [`Table`] stands in for a relational table: it stores [`Row`]s exactly as
//! a database would (ciphertext for encrypted columns) and offers the small
//! query surface records need.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::field::PlainValue;
use crate::key::CipherKey;
use crate::record::{Column, Record, RecordId, RecordSchema, Row, StoredValue};

/// Key override for one query execution.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cipher_key: Option<CipherKey>,
}

impl QueryContext {
    /// A context without a key.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(cipher_key: impl Into<CipherKey>) -> Self {
        Self {
            cipher_key: Some(cipher_key.into()),
        }
    }

    pub fn cipher_key(&self) -> Option<&CipherKey> {
        self.cipher_key.as_ref()
    }

    /// The key to use for one operation: this context's, else `bound`.
    pub fn resolve<'a>(&'a self, bound: Option<&'a CipherKey>) -> Option<&'a CipherKey> {
        self.cipher_key.as_ref().or(bound)
    }

    /// Materialise a stored row as a record bound to this context's key.
    ///
    /// Encrypted columns are decrypted eagerly when the key opens all of
    /// them. Otherwise the record keeps them sealed and the failure surfaces
    /// on [`Record::get`], so one row under another key does not fail the
    /// rows around it. Without a key the record is unkeyed.
    ///
    /// # Errors
    ///
    /// [`Error::ValueFormat`] if a stored plain value has the wrong kind.
    pub fn load(&self, schema: &Arc<RecordSchema>, id: Option<RecordId>, row: &Row) -> Result<Record> {
        let mut record = Record::from_row(Arc::clone(schema), id, row, self.cipher_key.clone())?;
        if let Err(e) = record.unseal() {
            debug!(schema = %schema.name(), ?id, error = %e, "record left sealed");
        }
        Ok(record)
    }
}

#[derive(Debug, Default)]
struct TableInner {
    last_id: RecordId,
    rows: BTreeMap<RecordId, Row>,
}

/// In-memory table of rows for one [`RecordSchema`].
///
/// Cheap to clone; clones share storage.
#[derive(Clone, Debug)]
pub struct Table {
    schema: Arc<RecordSchema>,
    inner: Arc<RwLock<TableInner>>,
}

impl Table {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self {
            schema,
            inner: Arc::new(RwLock::new(TableInner::default())),
        }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.rows.is_empty()
    }

    /// Insert a new record or update an existing one, assigning an id on
    /// first save.
    ///
    /// # Errors
    ///
    /// [`Error::MissingKey`] if an unkeyed record holds plaintext in an
    /// encrypted column, [`Error::NotFound`] if the record's id is gone, or
    /// [`Error::SchemaMismatch`] if the record belongs to another schema. The
    /// record is unchanged on error.
    pub async fn save(&self, record: &mut Record) -> Result<RecordId> {
        if record.schema().name() != self.schema.name() {
            return Err(Error::SchemaMismatch {
                expected: self.schema.name().to_owned(),
                found: record.schema().name().to_owned(),
            });
        }
        let row = record.to_row()?;

        let mut inner = self.inner.write().await;
        let id = match record.id() {
            Some(id) => {
                let slot = inner.rows.get_mut(&id).ok_or(Error::NotFound { id })?;
                *slot = row;
                id
            }
            None => {
                inner.last_id += 1;
                let id = inner.last_id;
                inner.rows.insert(id, row);
                id
            }
        };
        drop(inner);

        record.set_id(id);
        debug!(
            schema = %self.schema.name(),
            id,
            keyed = record.cipher_key().is_some(),
            "record saved"
        );
        Ok(id)
    }

    /// Build a keyed record from `values` and save it.
    ///
    /// # Errors
    ///
    /// As [`Record::with_values`] and [`Table::save`].
    pub async fn create<I, K, V>(&self, cipher_key: impl Into<CipherKey>, values: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<PlainValue>,
    {
        let mut record =
            Record::with_values(Arc::clone(&self.schema), Some(cipher_key.into()), values)?;
        self.save(&mut record).await?;
        Ok(record)
    }

    /// The stored row exactly as persisted, ciphertext included.
    pub async fn raw(&self, id: RecordId) -> Option<Row> {
        self.inner.read().await.rows.get(&id).cloned()
    }

    /// Remove a row. Returns whether it existed.
    pub async fn delete(&self, id: RecordId) -> bool {
        self.inner.write().await.rows.remove(&id).is_some()
    }

    /// Start a query with an empty context.
    pub fn objects(&self) -> Query {
        Query {
            table: self.clone(),
            context: QueryContext::new(),
            filters: Vec::new(),
        }
    }
}

/// A lazily-executed query over a [`Table`].
#[derive(Debug, Clone)]
pub struct Query {
    table: Table,
    context: QueryContext,
    filters: Vec<(String, PlainValue)>,
}

/// A filter compiled against the schema and the query key.
enum Predicate {
    Plain {
        column: String,
        value: PlainValue,
    },
    /// Equality on an encrypted column: the filter value encrypted under the
    /// query key, compared as raw ciphertext. Also matches legacy plaintext.
    Encrypted {
        column: String,
        value: PlainValue,
        ciphertext: Vec<u8>,
    },
}

impl Predicate {
    fn matches(&self, row: &Row) -> bool {
        let (column, value) = match self {
            Predicate::Plain { column, value } | Predicate::Encrypted { column, value, .. } => {
                (column, value)
            }
        };
        match (self, row.get(column)) {
            (_, Some(StoredValue::Plain(stored))) => stored == value,
            (Predicate::Encrypted { ciphertext, .. }, Some(StoredValue::Encrypted(stored))) => stored
                .ciphertext()
                .is_ok_and(|bytes| *bytes == *ciphertext.as_slice()),
            _ => false,
        }
    }
}

impl Query {
    /// Attach `cipher_key` to this query: every result record is bound to it
    /// and its encrypted columns are decrypted with it.
    pub fn decipher(mut self, cipher_key: impl Into<CipherKey>) -> Self {
        self.context = QueryContext::with_key(cipher_key);
        self
    }

    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = context;
        self
    }

    /// Keep rows whose `column` equals `value`.
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<PlainValue>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    /// The row with `id`, if it also passes the filters.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], or any error from [`Query::all`].
    pub async fn get(self, id: RecordId) -> Result<Record> {
        let predicates = self.compile()?;
        let row = {
            let inner = self.table.inner.read().await;
            inner
                .rows
                .get(&id)
                .filter(|row| predicates.iter().all(|p| p.matches(row)))
                .cloned()
        };
        let row = row.ok_or(Error::NotFound { id })?;
        debug!(schema = %self.table.schema.name(), id, keyed = self.context.cipher_key().is_some(), "query get");
        self.context.load(&self.table.schema, Some(id), &row)
    }

    /// Every matching row in id order.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownField`] or [`Error::ValueFormat`] for a bad filter,
    /// [`Error::MissingKey`] when filtering on an encrypted column without a
    /// key. Decryption errors are deferred to [`Record::get`].
    pub async fn all(self) -> Result<Vec<Record>> {
        let rows = self.matching_rows(None).await?;
        debug!(
            schema = %self.table.schema.name(),
            matched = rows.len(),
            keyed = self.context.cipher_key().is_some(),
            "query executed"
        );
        rows.iter()
            .map(|(id, row)| self.context.load(&self.table.schema, Some(*id), row))
            .collect()
    }

    /// The matching row with the lowest id.
    ///
    /// # Errors
    ///
    /// As [`Query::all`].
    pub async fn first(self) -> Result<Option<Record>> {
        let rows = self.matching_rows(Some(1)).await?;
        rows.first()
            .map(|(id, row)| self.context.load(&self.table.schema, Some(*id), row))
            .transpose()
    }

    /// Number of matching rows. Nothing is decrypted.
    ///
    /// # Errors
    ///
    /// As [`Query::all`], minus decryption errors.
    pub async fn count(self) -> Result<usize> {
        Ok(self.matching_rows(None).await?.len())
    }

    async fn matching_rows(&self, limit: Option<usize>) -> Result<Vec<(RecordId, Row)>> {
        let predicates = self.compile()?;
        let inner = self.table.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .filter(|(_, row)| predicates.iter().all(|p| p.matches(row)))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(id, row)| (*id, row.clone()))
            .collect())
    }

    fn compile(&self) -> Result<Vec<Predicate>> {
        let schema = &self.table.schema;
        self.filters
            .iter()
            .map(|(name, value)| -> Result<Predicate> {
                let column = schema
                    .column(name)
                    .ok_or_else(|| Error::unknown_field(name))?;
                column.kind().check(value)?;
                Ok(match column {
                    Column::Plain { .. } => Predicate::Plain {
                        column: name.clone(),
                        value: value.clone(),
                    },
                    Column::Encrypted(field) => {
                        let key = self
                            .context
                            .cipher_key()
                            .ok_or_else(|| Error::missing_key(name))?;
                        let sealed = field.to_storage(value, key)?;
                        let ciphertext = sealed
                            .ciphertext()
                            .map_err(crate::crypto::DecryptionError::from)?
                            .into_owned();
                        Predicate::Encrypted {
                            column: name.clone(),
                            value: value.clone(),
                            ciphertext,
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CipherKind, CipherSpec};
    use crate::field::FieldKind;
    use crate::record::KeyState;

    fn employees() -> Table {
        Table::new(
            RecordSchema::builder("employee")
                .plain("name", FieldKind::Text)
                .encrypted("ssn", FieldKind::Text, CipherSpec::default())
                .encrypted("salary", FieldKind::Decimal, CipherSpec::new(CipherKind::Aes))
                .build()
                .unwrap(),
        )
    }

    async fn seed(table: &Table) -> (Record, Record) {
        let first = table
            .create(
                "1234",
                [
                    ("name", PlainValue::from("example")),
                    ("ssn", PlainValue::from("OneTwo")),
                    ("salary", PlainValue::from(2000)),
                ],
            )
            .await
            .unwrap();
        let second = table
            .create(
                "abcd",
                [
                    ("name", PlainValue::from("example2")),
                    ("ssn", PlainValue::from("OneTwo")),
                    ("salary", PlainValue::from(3000)),
                ],
            )
            .await
            .unwrap();
        (first, second)
    }

    #[test]
    fn context_debug_redacts_key() {
        let shown = format!("{:?}", QueryContext::with_key("secret-key"));
        assert!(!shown.contains("secret-key"));
    }

    #[test]
    fn resolve_prefers_context_key() {
        let bound = CipherKey::from("bound");
        let ctx = QueryContext::with_key("override");
        assert_eq!(ctx.resolve(Some(&bound)).unwrap().as_bytes(), b"override");
        assert_eq!(
            QueryContext::new().resolve(Some(&bound)).unwrap().as_bytes(),
            b"bound"
        );
        assert!(QueryContext::new().resolve(None).is_none());
    }

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let table = employees();
        let (first, second) = seed(&table).await;
        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn decipher_get_restores_values() {
        let table = employees();
        let (first, _) = seed(&table).await;
        let id = first.id().unwrap();

        let loaded = table.objects().decipher("1234").get(id).await.unwrap();
        assert_eq!(loaded.key_state(), KeyState::Keyed);
        for field in ["name", "ssn", "salary"] {
            assert_eq!(loaded.get(field).unwrap(), first.get(field).unwrap());
        }
    }

    #[tokio::test]
    async fn get_without_key_leaves_fields_sealed() {
        let table = employees();
        let (first, _) = seed(&table).await;
        let loaded = table.objects().get(first.id().unwrap()).await.unwrap();
        assert_eq!(loaded.key_state(), KeyState::Unkeyed);
        assert!(loaded.is_sealed("ssn").unwrap());
        assert!(matches!(loaded.get("ssn"), Err(Error::MissingKey { .. })));
    }

    #[tokio::test]
    async fn filter_on_plain_column() {
        let table = employees();
        let (first, _) = seed(&table).await;
        let found = table
            .objects()
            .decipher("1234")
            .filter("name", "example")
            .first()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), first.id());
        assert_eq!(found.get("salary").unwrap(), Some(PlainValue::from(2000)));
    }

    #[tokio::test]
    async fn filter_on_encrypted_column_matches_only_that_key() {
        let table = employees();
        let (first, second) = seed(&table).await;

        let under_1234 = table
            .objects()
            .decipher("1234")
            .filter("ssn", "OneTwo")
            .all()
            .await
            .unwrap();
        assert_eq!(under_1234.len(), 1);
        assert_eq!(under_1234[0].id(), first.id());

        let under_abcd = table
            .objects()
            .decipher("abcd")
            .filter("salary", 3000)
            .count()
            .await
            .unwrap();
        assert_eq!(under_abcd, 1);
        let _ = second;
    }

    #[tokio::test]
    async fn filter_on_encrypted_column_needs_key() {
        let table = employees();
        seed(&table).await;
        let err = table.objects().filter("ssn", "OneTwo").count().await.unwrap_err();
        assert!(matches!(err, Error::MissingKey { field } if field == "ssn"));
    }

    #[tokio::test]
    async fn bad_filters_rejected() {
        let table = employees();
        assert!(matches!(
            table.objects().filter("age", 3).count().await,
            Err(Error::UnknownField { .. })
        ));
        assert!(matches!(
            table.objects().decipher("1234").filter("salary", "lots").count().await,
            Err(Error::ValueFormat(_))
        ));
    }

    #[tokio::test]
    async fn get_missing_id_is_not_found() {
        let table = employees();
        assert!(matches!(
            table.objects().get(42).await,
            Err(Error::NotFound { id: 42 })
        ));
    }

    #[tokio::test]
    async fn all_over_mixed_keys_keeps_every_row() {
        let table = employees();
        let (first, second) = seed(&table).await;

        let rows = table.objects().decipher("1234").all().await.unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].id(), first.id());
        assert!(!rows[0].is_sealed("ssn").unwrap());
        assert_eq!(rows[0].get("ssn").unwrap(), Some(PlainValue::from("OneTwo")));

        assert_eq!(rows[1].id(), second.id());
        assert_eq!(rows[1].get("name").unwrap(), Some(PlainValue::from("example2")));
        assert_ne!(
            rows[1].get("ssn").ok().flatten(),
            Some(PlainValue::from("OneTwo"))
        );
        let ctx = QueryContext::with_key("abcd");
        assert_eq!(
            rows[1].get_with("salary", &ctx).unwrap(),
            Some(PlainValue::from(3000))
        );
    }

    #[tokio::test]
    async fn save_rejects_vanished_row() {
        let table = employees();
        let (mut first, _) = seed(&table).await;
        assert!(table.delete(first.id().unwrap()).await);
        assert!(matches!(
            table.save(&mut first).await,
            Err(Error::NotFound { .. })
        ));
    }
}
