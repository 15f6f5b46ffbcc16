//! Tally Common Library
//!
//! Shared types and utilities for the Tally workspace.
//!
//! # Overview
//!
//! This crate provides functionality used by both the aggregation engine and
//! the HTTP server:
//!
//! - **Logging**: Centralized tracing setup (console/file, text/JSON)
//! - **Types**: The shared job model observed through the status API
//!
//! # Example
//!
//! ```no_run
//! use tally_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod types;

// Re-export commonly used types
pub use types::{Job, JobStatus};
