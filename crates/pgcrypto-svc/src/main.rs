//! `pgcrypto-svc`: HTTP front end for pgcrypto-compatible field encryption.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured logging.
//! 3. Load record schemas from `SCHEMA_PATH` into [`SchemaCache`].
//! 4. Spawn the schema refresh task.
//! 5. Build the Axum router and serve it.

mod config;
mod schema;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use schema::SchemaCache;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env().map_err(|e| {
        // Logging is not up yet.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    telemetry::init_telemetry(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        cipher = %cfg.cipher,
        armor = cfg.check_armor,
        "pgcrypto-svc starting"
    );

    let schema_cache = SchemaCache::new();
    schema::load_all(&cfg, &schema_cache)
        .await
        .context("initial schema load failed")?;

    let _schema_refresh = schema::refresh_task(cfg.clone(), schema_cache.clone());

    let state = AppState::new(
        schema_cache,
        cfg.schema_header_name.clone(),
        cfg.key_header_name.clone(),
    );
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
