mod api;
mod config;
mod engine;
mod error;
mod models;
mod observability;
mod state;
mod store;
mod sync;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::engine::assistant::CannedAssistant;
use crate::engine::pricing::HeuristicDistanceEstimator;
use crate::state::AppState;
use crate::sync::telemetry::run_fleet_telemetry;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let state = AppState::new(
        Arc::new(CannedAssistant),
        Arc::new(HeuristicDistanceEstimator),
        Duration::from_millis(config.assistant_timeout_ms),
    );
    state.bootstrap(&config)?;
    let shared_state = Arc::new(state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_fleet_telemetry(shared_state.clone()));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
