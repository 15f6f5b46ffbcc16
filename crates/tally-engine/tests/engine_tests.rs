//! End-to-end tests for the aggregation job engine
//!
//! These drive the full submit -> background pass -> terminal state pipeline
//! against real temp files. Scheduling-order assertions (saturation, cancel
//! before start) rely on `#[tokio::test]` using a current-thread runtime:
//! spawned workers cannot make progress until the test task awaits.

use std::path::PathBuf;
use std::time::Duration;

use tally_engine::{AggregationEngine, EngineConfig, EngineError, Job, JobRegistry, JobStatus};
use tempfile::TempDir;
use uuid::Uuid;

struct Fixture {
    engine: AggregationEngine,
    input_dir: TempDir,
    result_dir: TempDir,
}

fn fixture() -> Fixture {
    fixture_with(|_| {})
}

fn fixture_with(tweak: impl FnOnce(&mut EngineConfig)) -> Fixture {
    let input_dir = TempDir::new().unwrap();
    let result_dir = TempDir::new().unwrap();
    let mut config = EngineConfig {
        result_dir: result_dir.path().to_path_buf(),
        ..Default::default()
    };
    tweak(&mut config);
    let engine = AggregationEngine::new(JobRegistry::new(), config).unwrap();
    Fixture {
        engine,
        input_dir,
        result_dir,
    }
}

impl Fixture {
    fn write_input(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.input_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn wait_terminal(&self, job_id: Uuid) -> Job {
        for _ in 0..2000 {
            let job = self.engine.query(job_id).expect("job should exist");
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} did not reach a terminal state");
    }

    fn result_contents(&self, job_id: Uuid) -> String {
        let path = self.result_dir.path().join(format!("result_{job_id}.csv"));
        std::fs::read_to_string(path).unwrap()
    }
}

const HEADER: &str = "Department,Date,Sales\n";

#[tokio::test]
async fn test_worked_example_aggregates_and_sorts() {
    let fx = fixture();
    let input = fx.write_input(
        "sales.csv",
        &format!("{HEADER}Sales,2023-01-15,150\nMarketing,2023-01-15,75\nSales,2023-01-16,200\n"),
    );

    let job_id = fx.engine.submit(input.clone()).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_accepted, 3);
    assert_eq!(job.category_count, Some(2));
    assert_eq!(
        job.download_url,
        Some(format!("/download/result_{job_id}.csv"))
    );
    assert!(job.processing_time_ms.is_some());
    assert!(job.error.is_none());

    // Deterministic lexicographic row order in the artifact.
    assert_eq!(
        fx.result_contents(job_id),
        "Department Name,Total Number of Sales\nMarketing,75\nSales,350\n"
    );

    // Input is removed on the success path.
    assert!(!input.exists());
}

#[tokio::test]
async fn test_header_only_file_completes_empty() {
    let fx = fixture();
    let input = fx.write_input("empty.csv", HEADER);

    let job_id = fx.engine.submit(input).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_accepted, 0);
    assert_eq!(job.category_count, Some(0));
    assert_eq!(
        fx.result_contents(job_id),
        "Department Name,Total Number of Sales\n"
    );
}

#[tokio::test]
async fn test_bad_row_shape_fails_whole_job() {
    let fx = fixture();
    let input = fx.write_input(
        "bad.csv",
        &format!("{HEADER}Sales,2023-01-15,150\nSales,150\nMarketing,2023-01-15,75\n"),
    );

    let job_id = fx.engine.submit(input.clone()).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("expected 3 fields"));
    assert!(job.download_url.is_none());

    // No partial artifact, and symmetric cleanup removes the input too.
    assert!(!fx
        .result_dir
        .path()
        .join(format!("result_{job_id}.csv"))
        .exists());
    assert!(!input.exists());
}

#[tokio::test]
async fn test_unreadable_input_fails_job() {
    let fx = fixture();
    let missing = fx.input_dir.path().join("never-written.csv");

    let job_id = fx.engine.submit(missing).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("failed to open input file"));
}

#[tokio::test]
async fn test_empty_file_fails_on_missing_header() {
    let fx = fixture();
    let input = fx.write_input("zero.csv", "");

    let job_id = fx.engine.submit(input).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("header"));
}

#[tokio::test]
async fn test_non_numeric_count_dropped_rest_aggregated() {
    let fx = fixture();
    let input = fx.write_input(
        "mixed.csv",
        &format!("{HEADER}Sales,2023-01-15,150\nSales,2023-01-16,abc\nSales,2023-01-17,50\n"),
    );

    let job_id = fx.engine.submit(input).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_accepted, 2);
    assert_eq!(
        fx.result_contents(job_id),
        "Department Name,Total Number of Sales\nSales,200\n"
    );
}

#[tokio::test]
async fn test_overflow_fails_deterministically() {
    let fx = fixture();
    let input = fx.write_input(
        "overflow.csv",
        &format!("{HEADER}Sales,2023-01-15,{}\nSales,2023-01-16,1\n", i64::MAX),
    );

    let job_id = fx.engine.submit(input).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("overflowed"));
}

#[tokio::test]
async fn test_unknown_job_id_is_not_found() {
    let fx = fixture();
    let input = fx.write_input("one.csv", &format!("{HEADER}Sales,2023-01-15,1\n"));
    fx.engine.submit(input).unwrap();

    assert!(fx.engine.query(Uuid::new_v4()).is_none());
}

#[tokio::test]
async fn test_concurrent_submits_get_distinct_terminal_jobs() {
    let fx = fixture();
    let a = fx.write_input("a.csv", &format!("{HEADER}Sales,2023-01-15,1\n"));
    let b = fx.write_input("b.csv", &format!("{HEADER}Sales,2023-01-15,2\n"));

    let id_a = fx.engine.submit(a).unwrap();
    let id_b = fx.engine.submit(b).unwrap();
    assert_ne!(id_a, id_b);

    let job_a = fx.wait_terminal(id_a).await;
    let job_b = fx.wait_terminal(id_b).await;
    assert_eq!(job_a.status, JobStatus::Completed);
    assert_eq!(job_b.status, JobStatus::Completed);
    assert_eq!(fx.result_contents(id_b), "Department Name,Total Number of Sales\nSales,2\n");
}

#[tokio::test]
async fn test_same_path_submitted_twice_both_reach_terminal_state() {
    let fx = fixture();
    let input = fx.write_input("shared.csv", &format!("{HEADER}Sales,2023-01-15,1\n"));

    let id_a = fx.engine.submit(input.clone()).unwrap();
    let id_b = fx.engine.submit(input).unwrap();
    assert_ne!(id_a, id_b);

    // Whichever worker runs second may find the input already consumed and
    // removed; failed is a legitimate terminal state for it.
    assert!(fx.wait_terminal(id_a).await.status.is_terminal());
    assert!(fx.wait_terminal(id_b).await.status.is_terminal());
}

#[tokio::test]
async fn test_saturated_pool_rejects_without_blocking() {
    let fx = fixture_with(|config| {
        config.max_concurrent_jobs = 1;
        config.max_pending_jobs = 1;
    });
    let first = fx.write_input("first.csv", &format!("{HEADER}Sales,2023-01-15,1\n"));
    let second = fx.write_input("second.csv", &format!("{HEADER}Sales,2023-01-15,2\n"));
    let third = fx.write_input("third.csv", &format!("{HEADER}Sales,2023-01-15,3\n"));

    // Neither worker has been scheduled yet, so two submissions fill the
    // pool (one slot) plus the admission window (one slot).
    let id_first = fx.engine.submit(first).unwrap();
    let id_second = fx.engine.submit(second).unwrap();
    match fx.engine.submit(third) {
        Err(EngineError::Saturated) => {},
        other => panic!("expected saturation, got {other:?}"),
    }

    // Capacity frees up once the in-flight jobs finish.
    fx.wait_terminal(id_first).await;
    fx.wait_terminal(id_second).await;
    let fourth = fx.write_input("fourth.csv", &format!("{HEADER}Sales,2023-01-15,4\n"));
    assert!(fx.engine.submit(fourth).is_ok());
}

#[tokio::test]
async fn test_cancel_before_start_terminates_as_error() {
    let fx = fixture();
    let input = fx.write_input("cancel.csv", &format!("{HEADER}Sales,2023-01-15,1\n"));

    let job_id = fx.engine.submit(input.clone()).unwrap();
    assert!(fx.engine.request_cancel(job_id));

    let job = fx.wait_terminal(job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("job cancelled"));

    // Cancelled jobs still get the symmetric input cleanup.
    assert!(!input.exists());
}

#[tokio::test]
async fn test_cancel_after_completion_is_refused() {
    let fx = fixture();
    let input = fx.write_input("done.csv", &format!("{HEADER}Sales,2023-01-15,1\n"));

    let job_id = fx.engine.submit(input).unwrap();
    let job = fx.wait_terminal(job_id).await;
    assert_eq!(job.status, JobStatus::Completed);

    assert!(!fx.engine.request_cancel(job_id));
    assert_eq!(fx.engine.query(job_id).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_progress_checkpoints_during_long_run() {
    let fx = fixture_with(|config| config.batch_size = 10);

    let mut contents = String::from(HEADER);
    for i in 0..95 {
        contents.push_str(&format!("Sales,2023-01-15,{i}\n"));
    }
    let input = fx.write_input("long.csv", &contents);

    let job_id = fx.engine.submit(input).unwrap();
    let job = fx.wait_terminal(job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_accepted, 95);
    let expected: i64 = (0..95).sum();
    assert_eq!(
        fx.result_contents(job_id),
        format!("Department Name,Total Number of Sales\nSales,{expected}\n")
    );
}
