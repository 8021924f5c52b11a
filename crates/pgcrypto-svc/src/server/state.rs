//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::schema::SchemaCache;

/// Application state shared across all request handlers. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    pub schema_cache: SchemaCache,
    /// Header naming the record schema of a request.
    pub schema_header_name: Arc<String>,
    /// Header carrying the base64-encoded cipher key.
    pub key_header_name: Arc<String>,
}

impl AppState {
    pub fn new(
        schema_cache: SchemaCache,
        schema_header_name: String,
        key_header_name: String,
    ) -> Self {
        Self {
            schema_cache,
            schema_header_name: Arc::new(schema_header_name),
            key_header_name: Arc::new(key_header_name),
        }
    }
}

impl Default for AppState {
    /// An empty cache and the default header names, for tests.
    fn default() -> Self {
        Self::new(
            SchemaCache::new(),
            "X-Schema-Name".into(),
            "X-Cipher-Key".into(),
        )
    }
}
