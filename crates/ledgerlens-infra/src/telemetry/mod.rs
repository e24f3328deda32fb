//! Tracing initialization
//!
//! Human-readable output in development, JSON lines in production.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "ledgerlens=debug,tower_http=info";

/// Install the global tracing subscriber.
pub fn init_telemetry(service_name: &str, environment: &str) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = matches!(environment.to_lowercase().as_str(), "production" | "prod");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::info!(
        service = service_name,
        environment = environment,
        json_logs = json,
        "Tracing initialized"
    );
    Ok(())
}
