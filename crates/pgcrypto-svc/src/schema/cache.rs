//! In-memory cache of record schemas, keyed by schema name.
//!
//! Readers never block: the refresh task swaps in a whole new map through
//! `arc-swap`.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use pgcrypto_fields::RecordSchema;
use thiserror::Error;

/// Errors from the schema cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("unknown schema `{0}`")]
    UnknownSchema(String),
}

/// Shared, lock-free map of schema name to [`RecordSchema`].
#[derive(Clone, Debug, Default)]
pub struct SchemaCache {
    inner: Arc<ArcSwap<HashMap<String, Arc<RecordSchema>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Look up a schema by name.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownSchema`] if `name` is not present.
    pub fn get(&self, name: &str) -> Result<Arc<RecordSchema>, CacheError> {
        self.inner
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownSchema(name.to_owned()))
    }

    /// Atomically replace the entire schema map.
    pub fn replace_all(&self, schemas: HashMap<String, Arc<RecordSchema>>) {
        self.inner.store(Arc::new(schemas));
    }
}
