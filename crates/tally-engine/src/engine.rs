//! Aggregation engine orchestrator
//!
//! Binds parser, reducer, encoder and registry into the background job
//! pipeline: submit creates a job record and schedules the streaming pass on
//! a bounded worker pool, the owning worker drives
//! open -> parse -> reduce -> encode -> finalize, and status queries read the
//! last checkpointed snapshot without ever blocking on the worker.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tally_common::types::Job;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::encoder;
use crate::error::EngineError;
use crate::parser::RowStream;
use crate::reducer::{Aggregator, DEFAULT_BATCH_SIZE};
use crate::registry::JobRegistry;

/// Default bound on concurrently running jobs.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Default number of submitted jobs allowed to wait for a worker slot.
pub const DEFAULT_MAX_PENDING_JOBS: usize = 64;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory where result artifacts are written.
    pub result_dir: PathBuf,
    /// Jobs processing simultaneously. Submissions beyond this wait.
    pub max_concurrent_jobs: usize,
    /// Submitted-but-not-running jobs tolerated before submit rejects.
    pub max_pending_jobs: usize,
    /// Accepted records between progress checkpoints.
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            result_dir: PathBuf::from("./results"),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            max_pending_jobs: DEFAULT_MAX_PENDING_JOBS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Summary handed back by a successful streaming pass.
struct JobSummary {
    category_count: usize,
    records_accepted: u64,
    output_filename: String,
}

/// The asynchronous aggregation job engine.
///
/// Cheap to clone; clones share the registry and the worker pool. Every
/// submission immediately returns a job id and schedules exactly one
/// background unit of work; `submit` itself never touches the input file.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct AggregationEngine {
    registry: JobRegistry,
    config: Arc<EngineConfig>,
    permits: Arc<Semaphore>,
    /// Jobs submitted and not yet finished, pending or running.
    in_flight: Arc<AtomicUsize>,
}

impl AggregationEngine {
    /// Create an engine over an injected registry, ensuring the result
    /// directory exists.
    pub fn new(registry: JobRegistry, mut config: EngineConfig) -> Result<Self, EngineError> {
        // Zero would deadlock the pool or the checkpoint cadence.
        config.max_concurrent_jobs = config.max_concurrent_jobs.max(1);
        config.batch_size = config.batch_size.max(1);

        std::fs::create_dir_all(&config.result_dir)
            .map_err(|e| EngineError::Write(format!("failed to create result dir: {e}")))?;

        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Ok(Self {
            registry,
            config: Arc::new(config),
            permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The registry this engine records job state in.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Submit a file for aggregation and return the new job id immediately.
    ///
    /// The engine owns the input file from this point on and removes it when
    /// the job reaches a terminal state. Fails fast with
    /// [`EngineError::Saturated`] once `max_concurrent_jobs +
    /// max_pending_jobs` submissions are in flight; it never blocks waiting
    /// for a worker slot.
    pub fn submit(&self, input: PathBuf) -> Result<Uuid, EngineError> {
        let capacity = self.config.max_concurrent_jobs + self.config.max_pending_jobs;
        if self.in_flight.fetch_add(1, Ordering::SeqCst) >= capacity {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(capacity, "submission rejected, worker pool saturated");
            return Err(EngineError::Saturated);
        }

        let job_id = self.registry.create();
        info!(%job_id, input = %input.display(), "job submitted");

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_job(job_id, input).await;
            engine.in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(job_id)
    }

    /// Point-in-time snapshot of a job, or `None` for an id never issued.
    pub fn query(&self, job_id: Uuid) -> Option<Job> {
        self.registry.get(job_id)
    }

    /// Ask a job to stop at its next checkpoint. A cancelled job terminates
    /// as `error` with a distinct message; the status enum stays stable.
    pub fn request_cancel(&self, job_id: Uuid) -> bool {
        self.registry.request_cancel(job_id)
    }

    /// Filesystem location of a result artifact. Pure path join; callers
    /// must reject traversal attempts in `filename` before invoking this.
    pub fn result_path(&self, filename: &str) -> PathBuf {
        self.config.result_dir.join(filename)
    }

    /// Drive one job from worker-slot acquisition to its terminal state.
    async fn run_job(&self, job_id: Uuid, input: PathBuf) {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Only reachable if the semaphore were closed; it never is.
                self.registry.mark_failed(job_id, "worker pool unavailable");
                return;
            },
        };

        let started = Instant::now();
        let registry = self.registry.clone();
        let result_dir = self.config.result_dir.clone();
        let batch_size = self.config.batch_size;
        let cancel = self
            .registry
            .cancel_flag(job_id)
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let input_path = input.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            process_file(&input_path, &result_dir, job_id, &registry, batch_size, &cancel)
        })
        .await;

        match outcome {
            Ok(Ok(summary)) => {
                let elapsed = started.elapsed();
                info!(
                    %job_id,
                    records_accepted = summary.records_accepted,
                    category_count = summary.category_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "job completed"
                );
                self.registry.mark_completed(
                    job_id,
                    format!("/download/{}", summary.output_filename),
                    elapsed,
                    summary.category_count,
                    summary.records_accepted,
                );
            },
            Ok(Err(e)) => {
                error!(%job_id, error = %e, "job failed");
                self.registry.mark_failed(job_id, e.to_string());
            },
            Err(e) => {
                error!(%job_id, error = %e, "job worker panicked");
                self.registry.mark_failed(job_id, "internal worker failure");
            },
        }

        // Symmetric cleanup: the input is removed on every terminal state,
        // success or failure.
        if let Err(e) = tokio::fs::remove_file(&input).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(%job_id, input = %input.display(), error = %e, "failed to remove input file");
            }
        }

        drop(permit);
    }
}

/// The streaming pass: one sequential read of the input, O(1) memory per
/// record, periodic checkpoints into the registry, then the artifact write.
fn process_file(
    input: &Path,
    result_dir: &Path,
    job_id: Uuid,
    registry: &JobRegistry,
    batch_size: usize,
    cancel: &AtomicBool,
) -> Result<JobSummary, EngineError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(EngineError::Cancelled);
    }

    let rows = RowStream::open(input)?;
    let mut aggregator = Aggregator::new();

    for row in rows {
        let row = row?;
        if aggregator.accept(&row)? && aggregator.accepted() % batch_size as u64 == 0 {
            registry.update_progress(job_id, aggregator.accepted());
            if cancel.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }
        }
    }

    let output_filename = format!("result_{job_id}.csv");
    encoder::write_totals_file(&result_dir.join(&output_filename), aggregator.totals())?;

    Ok(JobSummary {
        category_count: aggregator.category_count(),
        records_accepted: aggregator.accepted(),
        output_filename,
    })
}
