//! Concurrency-safe job registry
//!
//! Keyed store of job id to job state. The registry is an explicit value
//! injected into the engine (and cloned into workers), not a process-wide
//! singleton, so tests can run any number of independent registries.
//!
//! Locking discipline: one `RwLock` over the whole map. Each job has exactly
//! one writer, its background worker, so writers only ever contend across
//! different jobs; readers take snapshots and never observe a partially
//! written entry. Mutators are no-ops for unknown ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tally_common::types::{Job, JobStatus};
use uuid::Uuid;

struct JobEntry {
    job: Job,
    /// Cooperative cancellation flag, checked by the worker between batches.
    cancel: Arc<AtomicBool>,
}

/// Concurrency-safe store of job lifecycle state.
///
/// Cheap to clone; clones share the same underlying map. Entries are never
/// evicted within a process lifetime.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new job in `processing` state and return its id.
    ///
    /// Safe to call concurrently from many callers; ids are v4 UUIDs and
    /// distinct per call.
    pub fn create(&self) -> Uuid {
        let job_id = Uuid::new_v4();
        let entry = JobEntry {
            job: Job::new(job_id),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        self.write_lock().insert(job_id, entry);
        job_id
    }

    /// Point-in-time snapshot of a job, or `None` for an id never issued.
    pub fn get(&self, job_id: Uuid) -> Option<Job> {
        self.read_lock().get(&job_id).map(|entry| entry.job.clone())
    }

    /// Checkpoint the accepted-record count of a still-processing job.
    ///
    /// Leaves `status` untouched so concurrent readers observe monotonically
    /// increasing progress during a long run. No-op once terminal or for an
    /// unknown id.
    pub fn update_progress(&self, job_id: Uuid, records_accepted: u64) {
        if let Some(entry) = self.write_lock().get_mut(&job_id) {
            if entry.job.status == JobStatus::Processing {
                entry.job.records_accepted = records_accepted;
            }
        }
    }

    /// Terminal success update. No-op for an unknown id.
    pub fn mark_completed(
        &self,
        job_id: Uuid,
        download_url: String,
        elapsed: Duration,
        category_count: usize,
        records_accepted: u64,
    ) {
        if let Some(entry) = self.write_lock().get_mut(&job_id) {
            entry.job.status = JobStatus::Completed;
            entry.job.download_url = Some(download_url);
            entry.job.processing_time_ms = Some(elapsed.as_millis() as u64);
            entry.job.category_count = Some(category_count);
            entry.job.records_accepted = records_accepted;
        }
    }

    /// Terminal failure update. No-op for an unknown id.
    pub fn mark_failed(&self, job_id: Uuid, message: impl Into<String>) {
        if let Some(entry) = self.write_lock().get_mut(&job_id) {
            entry.job.status = JobStatus::Failed;
            entry.job.error = Some(message.into());
        }
    }

    /// Ask a job to stop at its next checkpoint.
    ///
    /// Returns true if the job exists and was still processing. Terminal
    /// jobs are unaffected.
    pub fn request_cancel(&self, job_id: Uuid) -> bool {
        match self.read_lock().get(&job_id) {
            Some(entry) if entry.job.status == JobStatus::Processing => {
                entry.cancel.store(true, Ordering::Relaxed);
                true
            },
            _ => false,
        }
    }

    /// The cancellation flag shared with the job's worker.
    pub(crate) fn cancel_flag(&self, job_id: Uuid) -> Option<Arc<AtomicBool>> {
        self.read_lock().get(&job_id).map(|entry| entry.cancel.clone())
    }

    /// Number of jobs tracked since startup.
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, JobEntry>> {
        self.inner.read().expect("job registry lock poisoned")
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, JobEntry>> {
        self.inner.write().expect("job registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_returns_distinct_ids() {
        let registry = JobRegistry::new();
        let a = registry.create();
        let b = registry.create();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_unknown_id_is_none() {
        let registry = JobRegistry::new();
        registry.create();
        assert!(registry.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_new_job_is_processing() {
        let registry = JobRegistry::new();
        let id = registry.create();
        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.records_accepted, 0);
        assert!(job.download_url.is_none());
    }

    #[test]
    fn test_progress_is_visible_to_readers() {
        let registry = JobRegistry::new();
        let id = registry.create();

        registry.update_progress(id, 1000);
        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.records_accepted, 1000);
    }

    #[test]
    fn test_progress_ignored_after_terminal_state() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.mark_failed(id, "boom");

        registry.update_progress(id, 5000);
        assert_eq!(registry.get(id).unwrap().records_accepted, 0);
    }

    #[test]
    fn test_mutators_are_noops_for_unknown_ids() {
        let registry = JobRegistry::new();
        let ghost = Uuid::new_v4();
        registry.update_progress(ghost, 10);
        registry.mark_failed(ghost, "nope");
        registry.mark_completed(ghost, "/download/x.csv".into(), Duration::ZERO, 0, 0);
        assert!(registry.get(ghost).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mark_completed_populates_success_fields() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.mark_completed(
            id,
            format!("/download/result_{id}.csv"),
            Duration::from_millis(1234),
            2,
            3,
        );

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.download_url, Some(format!("/download/result_{id}.csv")));
        assert_eq!(job.processing_time_ms, Some(1234));
        assert_eq!(job.category_count, Some(2));
        assert_eq!(job.records_accepted, 3);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_mark_failed_sets_message() {
        let registry = JobRegistry::new();
        let id = registry.create();
        registry.mark_failed(id, "failed to open input file");

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("failed to open input file"));
    }

    #[test]
    fn test_cancel_only_while_processing() {
        let registry = JobRegistry::new();
        let id = registry.create();
        assert!(registry.request_cancel(id));
        assert!(registry.cancel_flag(id).unwrap().load(Ordering::Relaxed));

        let done = registry.create();
        registry.mark_completed(done, "/download/x.csv".into(), Duration::ZERO, 0, 0);
        assert!(!registry.request_cancel(done));

        assert!(!registry.request_cancel(Uuid::new_v4()));
    }

    #[test]
    fn test_concurrent_creates_and_reads() {
        let registry = JobRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..100 {
                    let id = registry.create();
                    assert!(registry.get(id).is_some());
                    ids.push(id);
                }
                ids
            }));
        }

        let mut all: Vec<Uuid> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(registry.len(), 800);
    }
}
