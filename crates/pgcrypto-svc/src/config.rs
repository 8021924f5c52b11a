//! Configuration loading and validation for the field-encryption service.
//!
//! All values are read from environment variables at startup. The process
//! exits with a clear error message if any required variable is missing or
//! invalid.

use anyhow::{Context, Result};
use pgcrypto_fields::{CipherKind, CipherSpec};
use serde::Deserialize;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the YAML or JSON file declaring record schemas. **Required.**
    pub schema_path: String,

    /// How often (seconds) to re-read the schema file.
    #[serde(default = "default_schema_refresh_interval")]
    pub schema_refresh_interval_secs: u64,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// HTTP header naming the record schema of a request.
    #[serde(default = "default_schema_header")]
    pub schema_header_name: String,

    /// HTTP header carrying the base64-encoded cipher key.
    #[serde(default = "default_key_header")]
    pub key_header_name: String,

    /// Cipher for encrypted columns that do not name their own.
    #[serde(default)]
    pub cipher: CipherKind,

    /// Store armored text rather than raw ciphertext by default.
    #[serde(default = "default_check_armor")]
    pub check_armor: bool,

    /// Embed a `Version:` header in armored output by default.
    #[serde(default)]
    pub versioned: bool,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_schema_refresh_interval() -> u64 {
    300
}
fn default_listen_port() -> u16 {
    8080
}
fn default_schema_header() -> String {
    "X-Schema-Name".into()
}
fn default_key_header() -> String {
    "X-Cipher-Key".into()
}
fn default_check_armor() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// The cipher spec applied to encrypted columns without an override.
    pub fn default_spec(&self) -> CipherSpec {
        CipherSpec::new(self.cipher)
            .with_armor(self.check_armor)
            .with_version(self.versioned)
    }

    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.schema_path, "SCHEMA_PATH")?;
        ensure_non_empty(&self.schema_header_name, "SCHEMA_HEADER_NAME")?;
        ensure_non_empty(&self.key_header_name, "KEY_HEADER_NAME")?;

        if self
            .schema_header_name
            .eq_ignore_ascii_case(&self.key_header_name)
        {
            anyhow::bail!("SCHEMA_HEADER_NAME and KEY_HEADER_NAME must differ");
        }
        if self.schema_refresh_interval_secs == 0 {
            anyhow::bail!("SCHEMA_REFRESH_INTERVAL_SECS must be > 0");
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
