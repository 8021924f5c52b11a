//! Record schema loading and caching.
//!
//! Schemas are declared in one YAML (or JSON) file mapping each schema name
//! to its column list:
//!
//! ```yaml
//! employee:
//!   - { name: name, kind: text }
//!   - { name: ssn, kind: text, encrypted: true }
//!   - { name: salary, kind: decimal, encrypted: true, cipher: { cipher: aes } }
//! ```
//!
//! Encrypted columns without a `cipher` use the configured default spec.

pub mod cache;

pub use cache::SchemaCache;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pgcrypto_fields::record::ColumnDefinition;
use pgcrypto_fields::{CipherSpec, RecordSchema};
use tokio::time;
use tracing::{info, warn};

use crate::config::Config;

type SchemaFile = BTreeMap<String, Vec<ColumnDefinition>>;

/// Parse a schema file and build every schema it declares.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is neither YAML nor JSON, or
/// declares an invalid schema.
pub async fn load_file(
    path: &Path,
    default_spec: CipherSpec,
) -> Result<HashMap<String, Arc<RecordSchema>>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read schema file {}", path.display()))?;

    let file: SchemaFile = if let Ok(parsed) = serde_yaml::from_str(&text) {
        parsed
    } else if let Ok(parsed) = serde_json::from_str(&text) {
        parsed
    } else {
        anyhow::bail!(
            "failed to parse schema file {}: not valid YAML or JSON",
            path.display()
        );
    };

    if file.is_empty() {
        warn!(path = %path.display(), "schema file declares no schemas");
    }

    file.into_iter()
        .map(|(name, columns)| -> Result<(String, Arc<RecordSchema>)> {
            let schema = RecordSchema::from_definitions(&name, &columns, default_spec)
                .with_context(|| format!("invalid schema `{name}`"))?;
            info!(
                schema = %name,
                columns = schema.columns().len(),
                encrypted = schema.crypto_fields().count(),
                "loaded schema"
            );
            Ok((name, schema))
        })
        .collect()
}

/// Load the configured schema file and atomically replace the cache.
///
/// # Errors
///
/// As [`load_file`]; the cache is left untouched on error.
pub async fn load_all(cfg: &Config, cache: &SchemaCache) -> Result<()> {
    let schemas = load_file(Path::new(&cfg.schema_path), cfg.default_spec()).await?;
    cache.replace_all(schemas);
    info!(count = cache.len(), "schema cache refreshed");
    Ok(())
}

/// Spawn a background task that periodically reloads the schema file.
///
/// On failure the previous cache contents are retained and a warning is
/// emitted.
pub fn refresh_task(cfg: Config, cache: SchemaCache) -> tokio::task::JoinHandle<()> {
    let interval = std::time::Duration::from_secs(cfg.schema_refresh_interval_secs);
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // The first tick fires immediately; startup already loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = load_all(&cfg, &cache).await {
                warn!(error = %e, "schema refresh failed; retaining previous cache");
            }
        }
    })
}
