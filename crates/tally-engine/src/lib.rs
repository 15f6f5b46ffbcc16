//! Tally Aggregation Engine
//!
//! Asynchronous job engine that streams a (category, date, count) CSV into
//! per-category totals. Memory use is independent of input size: the file is
//! read in a single pass, one record at a time.
//!
//! # Architecture
//!
//! - [`parser`]: lazy row stream with strict 3-field shape checking
//! - [`reducer`]: per-category fold with checked 64-bit totals
//! - [`encoder`]: deterministic (lexicographic) result CSV writer
//! - [`registry`]: concurrency-safe job state store, injected, snapshot reads
//! - [`engine`]: the orchestrator with bounded worker pool, lifecycle
//!   updates, and cooperative cancellation
//!
//! The HTTP layer lives in `tally-server` and only ever talks to
//! [`engine::AggregationEngine`] through `submit` / `query` / `result_path`.
//!
//! # Example
//!
//! ```no_run
//! use tally_engine::{AggregationEngine, EngineConfig, JobRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = AggregationEngine::new(JobRegistry::new(), EngineConfig::default())?;
//!     let job_id = engine.submit("./uploads/sales.csv".into())?;
//!     println!("{:?}", engine.query(job_id));
//!     Ok(())
//! }
//! ```

pub mod encoder;
pub mod engine;
pub mod error;
pub mod parser;
pub mod reducer;
pub mod registry;

// Re-export commonly used types
pub use engine::{AggregationEngine, EngineConfig};
pub use error::EngineError;
pub use registry::JobRegistry;
pub use tally_common::types::{Job, JobStatus};
