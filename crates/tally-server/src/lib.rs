//! Tally Server Library
//!
//! HTTP server for asynchronous CSV aggregation jobs.
//!
//! # Overview
//!
//! The server exposes a small REST API around the aggregation engine:
//!
//! - **Upload**: `POST /api/v1/upload` accepts a multipart CSV and returns
//!   a job id immediately
//! - **Status**: `GET /api/v1/status/:job_id` reports progress and outcome
//! - **Download**: `GET /api/v1/download/:filename` streams a result file
//! - **Health**: `GET /health` liveness probe
//!
//! Jobs run on a bounded background worker pool inside the process; there is
//! no external queue or database. Uploads past the pool's capacity are
//! rejected with 503 rather than queued without limit.
//!
//! ## Framework Stack
//!
//! - **Axum**: web framework and multipart handling
//! - **Tower / tower-http**: middleware (CORS, tracing, compression)
//! - **Tokio**: async runtime and blocking worker offload

pub mod api;
pub mod app;
pub mod config;
pub mod features;
pub mod middleware;

pub use app::create_router;
pub use config::Config;
