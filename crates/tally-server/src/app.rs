//! Application router assembly
//!
//! Builds the full router (health endpoint, versioned feature routes,
//! middleware stack) from configuration and an engine handle. Kept out of
//! `main` so integration tests can drive the exact production router.

use axum::{extract::DefaultBodyLimit, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tally_engine::AggregationEngine;

use crate::{config::Config, features, middleware};

/// Create the application router with all routes and middleware
pub fn create_router(engine: AggregationEngine, config: &Config) -> Router {
    let feature_state = features::FeatureState {
        engine,
        upload_dir: config.jobs.upload_dir.clone(),
    };

    let feature_routes = features::router(feature_state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", feature_routes)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        // Apply layers from innermost to outermost
        .layer(tower_http::compression::CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
