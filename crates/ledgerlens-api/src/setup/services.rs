//! Store and service wiring

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ledgerlens_core::{IntakeConfig, RateStoreBackend};
use ledgerlens_infra::{MemoryRateStore, PgRateStore, RateLimiter, RateStore};
use ledgerlens_services::{
    CodeMailer, MemoryCodeStore, MemorySessionStore, RetentionSweeper, UploadOrchestrator,
};

use super::database;
use crate::state::AppState;

/// In-process buckets, or Postgres when several instances share limits
pub async fn setup_rate_store(config: &IntakeConfig) -> Result<Arc<dyn RateStore>> {
    match config.rate_limit.store_backend {
        RateStoreBackend::Memory => {
            tracing::info!("Using in-process rate store");
            Ok(Arc::new(MemoryRateStore::new()))
        }
        RateStoreBackend::Postgres => {
            let url = config
                .rate_limit
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when RATE_STORE=postgres")?;
            let pool = database::setup_database(url).await?;
            tracing::info!("Using Postgres rate store");
            Ok(Arc::new(PgRateStore::new(pool)))
        }
    }
}

pub fn build_state(
    config: IntakeConfig,
    rate_store: Arc<dyn RateStore>,
    mailer: Arc<dyn CodeMailer>,
) -> Arc<AppState> {
    let limiter = RateLimiter::from_config(rate_store, &config.rate_limit);
    tracing::info!(
        backend = limiter.backend(),
        failure_policy = ?limiter.failure_policy(),
        "Rate limiter ready"
    );

    let orchestrator = UploadOrchestrator::new(
        &config,
        limiter,
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryCodeStore::new()),
        mailer,
    );

    Arc::new(AppState {
        config,
        orchestrator,
    })
}

/// Spawn the retention sweeper for the state's stores
pub fn start_sweeper(state: &AppState) -> tokio::task::JoinHandle<()> {
    let orchestrator = &state.orchestrator;
    let sweeper = Arc::new(RetentionSweeper::new(
        orchestrator.sessions(),
        orchestrator.gate().clone(),
        orchestrator.limiter().clone(),
        Duration::from_secs(state.config.retention.sweep_interval_secs),
        Duration::from_millis(state.config.rate_limit.store_timeout_ms),
    ));
    tracing::info!(
        interval_secs = state.config.retention.sweep_interval_secs,
        "Retention sweeper started"
    );
    sweeper.start()
}
