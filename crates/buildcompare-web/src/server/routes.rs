//! Router configuration for the API server.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use buildcompare_core::PolicyName;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::rate_limit::{enforce, PolicyGate};
use super::AppState;

/// Largest accepted request body (photo uploads).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    // Lookups that fan out to retailers or models
    let scraping = Router::new()
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/v1/prices", get(handlers::prices))
        .route("/api/v1/compare", post(handlers::compare))
        .route("/api/v1/estimator/boq", post(handlers::boq))
        .route_layer(from_fn_with_state(
            PolicyGate::new(&state.limiter, PolicyName::Scraping),
            enforce,
        ));

    let general = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/calc/technical", post(handlers::technical))
        .route_layer(from_fn_with_state(
            PolicyGate::new(&state.limiter, PolicyName::Default),
            enforce,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(scraping)
        .merge(general)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
