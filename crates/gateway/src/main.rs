//! `gateway` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise tracing (JSON logs, optional OTLP export).
//! 3. Resolve the encryption key (env, Secrets Manager, or fallback).
//! 4. Build the sensitive-field registry (file or built-in).
//! 5. Connect the PostgREST store client.
//! 6. Build the Axum router and start serving.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use gateway::codec::FieldCodec;
use gateway::config::Config;
use gateway::gateway::Gateway;
use gateway::registry::{self, SensitiveFieldRegistry};
use gateway::server::{self, state::AppState};
use gateway::store::PostgrestStore;
use gateway::{key, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        "gateway starting"
    );

    // -----------------------------------------------------------------------
    // 3. Encryption key
    // -----------------------------------------------------------------------
    let keys = key::load(&cfg).await;

    // -----------------------------------------------------------------------
    // 4. Sensitive-field registry
    // -----------------------------------------------------------------------
    let registry = match cfg.sensitive_fields_path.as_deref() {
        Some(path) => registry::load_file(path)?,
        None => SensitiveFieldRegistry::builtin(),
    };
    info!(tables = registry.len(), "sensitive-field registry ready");

    // -----------------------------------------------------------------------
    // 5. Remote store
    // -----------------------------------------------------------------------
    let store = PostgrestStore::new(&cfg.store_url, cfg.store_api_key.clone())
        .context("failed to create store client")?;

    // -----------------------------------------------------------------------
    // 6. HTTP server
    // -----------------------------------------------------------------------
    let codec = FieldCodec::new(keys, Arc::new(registry));
    let state = AppState::new(Gateway::new(Arc::new(store), codec));
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router).await?;

    Ok(())
}
