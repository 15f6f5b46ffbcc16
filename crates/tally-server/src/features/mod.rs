//! Feature modules
//!
//! Each feature owns its routes and maps its own errors onto the standard
//! response envelopes. The router here is nested under `/api/v1` by `main`.

use axum::Router;
use std::path::PathBuf;
use tally_engine::AggregationEngine;

pub mod jobs;

/// Shared state for feature handlers
#[derive(Clone)]
pub struct FeatureState {
    pub engine: AggregationEngine,
    pub upload_dir: PathBuf,
}

/// Create the combined feature router
pub fn router(state: FeatureState) -> Router {
    Router::new().merge(jobs::jobs_routes()).with_state(state)
}
