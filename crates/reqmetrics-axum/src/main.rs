//! reqmetrics sample server.
//!
//! - Settings from `reqmetrics.yaml` (defaults when the file is absent)
//! - Request metrics on every demo route
//! - Metrics module at `module.path` (default `/metrics`)

use std::net::SocketAddr;
use std::path::Path;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing_subscriber::{fmt, EnvFilter};

use reqmetrics_axum::{config, router, Pipelines, ReqMetricsConfig};

const SETTINGS_FILE: &str = "reqmetrics.yaml";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(code = e.code().as_str(), error = %e, "reqmetrics-sample failed");
        std::process::exit(1);
    }
}

async fn run() -> reqmetrics_core::Result<()> {
    let settings = if Path::new(SETTINGS_FILE).exists() {
        config::load_from_file(SETTINGS_FILE)?
    } else {
        tracing::info!(file = SETTINGS_FILE, "settings file not found; using defaults");
        config::Settings::default()
    };
    let listen: SocketAddr = settings
        .listen
        .parse()
        .map_err(|e| reqmetrics_core::ReqMetricsError::BadConfig(format!("listen: {e}")))?;

    let mut pipelines = Pipelines::new();
    let metrics = ReqMetricsConfig::global().apply_settings(&settings, &mut pipelines);
    if let Some(health) = metrics.health() {
        health.register("sample", || Ok("running".to_string()));
    }

    // Turn handler panics into a plain 500 once the errors meter has seen them.
    pipelines.add_on_error_to_end("sample.internal_error", |_, fault| {
        Some((StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {}", fault.message)).into_response())
    });

    let app = router::build_router(pipelines);

    tracing::info!(%listen, module = %settings.module.path, "reqmetrics-sample starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| reqmetrics_core::ReqMetricsError::Internal(format!("bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| reqmetrics_core::ReqMetricsError::Internal(format!("server failed: {e}")))
}
