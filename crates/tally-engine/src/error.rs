//! Error types for the aggregation engine
//!
//! The taxonomy mirrors how failures terminate (or do not terminate) a job:
//! access, structural, write and overflow errors are fatal for the job that
//! hit them; a count field that fails to parse is not an error at all, the
//! record is silently dropped by the reducer. Nothing is retried: a failed
//! job is resubmitted by the caller with fresh input.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Fatal conditions for an aggregation job
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input file could not be opened.
    #[error("failed to open input file: {0}")]
    Access(#[source] std::io::Error),

    /// Header unreadable, or a data row without exactly 3 fields. A wrong
    /// column count means misaligned data and fails the whole job.
    #[error("malformed input: {0}")]
    Structural(String),

    /// A category total exceeded the i64 range. The job fails
    /// deterministically; totals never wrap.
    #[error("total for category '{category}' overflowed the 64-bit accumulator")]
    Overflow { category: String },

    /// Result artifact could not be persisted.
    #[error("failed to write result: {0}")]
    Write(String),

    /// The job was cancelled cooperatively between batches.
    #[error("job cancelled")]
    Cancelled,

    /// The worker pool and its admission window are full; the submission
    /// was rejected without creating a job.
    #[error("engine at capacity, submission rejected")]
    Saturated,
}
