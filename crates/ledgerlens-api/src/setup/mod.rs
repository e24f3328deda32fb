//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use ledgerlens_core::IntakeConfig;
use tokio::task::JoinHandle;

use crate::state::AppState;

/// Everything the binary needs to serve requests
pub struct InitializedApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub sweeper: JoinHandle<()>,
}

/// Validate config, install telemetry, wire stores and spawn the sweeper.
pub async fn initialize_app(config: IntakeConfig) -> Result<InitializedApp> {
    config.validate().context("Configuration validation failed")?;

    ledgerlens_infra::init_telemetry("ledgerlens-api", &config.server.environment)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        max_rows = config.limits.max_rows,
        email_enabled = config.smtp.enabled,
        allow_export_bypass = config.verification.allow_export_bypass,
        "Configuration loaded"
    );

    let rate_store = services::setup_rate_store(&config).await?;
    let mailer = ledgerlens_services::mailer_from_config(&config.smtp);
    let state = services::build_state(config.clone(), rate_store, mailer);
    let sweeper = services::start_sweeper(&state);
    let router = routes::setup_routes(&config, state.clone())?;

    Ok(InitializedApp {
        state,
        router,
        sweeper,
    })
}
