//! Server startup and graceful shutdown

use std::net::SocketAddr;

use anyhow::{Context, Result};
use ledgerlens_core::IntakeConfig;

use super::InitializedApp;

/// Serve until a shutdown signal arrives, then stop the sweeper.
pub async fn start_server(config: &IntakeConfig, app: InitializedApp) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        addr = %addr,
        environment = %config.server.environment,
        trusted_proxy_count = config.server.trusted_proxy_count,
        retention_hours = config.retention.retention_hours,
        rate_store = ?config.rate_limit.store_backend,
        "Intake API accepting connections"
    );

    axum::serve(
        listener,
        app.router
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    app.sweeper.abort();
    tracing::info!("Retention sweeper stopped");

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM. A handler that cannot be installed is logged
/// and the other signal is still honored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "ctrl_c", "Shutdown requested"),
        _ = terminate => tracing::info!(signal = "sigterm", "Shutdown requested"),
    }
}
