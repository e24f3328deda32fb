//! Route configuration and setup

use crate::constants::{API_PREFIX, HTTP_CONCURRENCY_LIMIT, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{delete, get, post},
    Router,
};
use ledgerlens_core::IntakeConfig;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(
    config: &IntakeConfig,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let body_limit = state.orchestrator.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES;
    tracing::info!(
        body_limit_bytes = body_limit,
        max_rows = config.limits.max_rows,
        "Configuring routes"
    );

    let api = Router::new()
        .route("/uploads", post(handlers::uploads::upload_statement))
        .route("/uploads/{id}", delete(handlers::uploads::delete_upload))
        .route("/uploads/{id}/export", get(handlers::uploads::export_upload))
        .route("/verification/code", post(handlers::verification::send_code))
        .route("/verification/verify", post(handlers::verification::verify_code));

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest(API_PREFIX, api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(setup_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(crate::constants::EMAIL_TOKEN_HEADER),
        ])
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static(crate::constants::RATE_LIMIT_REMAINING_HEADER),
        ])
}
