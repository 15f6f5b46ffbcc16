//! Aggregation job feature: upload, status polling, result download

pub mod routes;

pub use routes::jobs_routes;
