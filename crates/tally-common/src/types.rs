//! Common types used across Tally
//!
//! The job model defined here is the only state the engine exposes to
//! observers. Readers always receive a cloned snapshot; the owning worker
//! task is the only writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an aggregation job.
///
/// `processing` is the initial state; `completed` and `error` are terminal.
/// There is no queued state: submission schedules work immediately, and a
/// job waiting for a worker slot still reports `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    /// Terminal failure state. Serialized as the literal string `"error"`.
    #[serde(rename = "error")]
    Failed,
}

impl JobStatus {
    /// Whether no further transitions can occur from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "error"),
        }
    }
}

/// Snapshot of one aggregation job as observed through the status API.
///
/// Optional fields are absent until the state that produces them is reached:
/// the download/elapsed/category fields only on completion, `error` only on
/// failure. `records_accepted` advances in checkpoints while the job is
/// still processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_count: Option<usize>,
    pub records_accepted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job record in the initial `processing` state.
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            download_url: None,
            processing_time_ms: None,
            category_count: None,
            records_accepted: 0,
            error: None,
            created_at: Utc::now(),
        }
    }
}
