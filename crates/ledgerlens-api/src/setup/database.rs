//! Postgres pool and schema for the shared rate store

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Admission runs one short transaction per scope; a small pool is plenty.
const MAX_CONNECTIONS: u32 = 10;

/// Connect, then bring `rate_buckets` and `ban_entries` up to date.
pub async fn setup_database(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
        .context("Failed to connect to the rate store database")?;
    tracing::info!(max_connections = MAX_CONNECTIONS, "Rate store database connected");

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &PgPool) -> Result<()> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = Migrator::new(dir.clone())
        .await
        .with_context(|| format!("Failed to load migrations from {}", dir.display()))?;
    migrator
        .run(pool)
        .await
        .context("Failed to apply rate store migrations")?;
    tracing::info!(
        migrations = migrator.iter().count(),
        "Rate store schema up to date"
    );
    Ok(())
}
