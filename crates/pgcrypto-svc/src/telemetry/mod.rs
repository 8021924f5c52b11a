//! Structured logging setup.
//!
//! Log events carry schema names, column names and cipher families. Key
//! bytes and field values must never appear in a span attribute or log field.
//!
//! The level comes from `LOG_LEVEL` (default `info`); `RUST_LOG` overrides it.

pub mod init;

pub use init::init_telemetry;
