//! HTTP routes for aggregation jobs
//!
//! - `POST /upload` accepts a multipart CSV and queues a background job
//! - `GET /status/:job_id` reports job progress and outcome
//! - `GET /download/:filename` streams a finished result file

use axum::{
    body::Body,
    extract::{Multipart, Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::path::Path;
use tally_engine::EngineError;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::FeatureState;

/// Create the job routes
pub fn jobs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/upload", post(upload_csv))
        .route("/status/:job_id", get(job_status))
        .route("/download/:filename", get(download_result))
}

/// Errors returned by the job endpoints
#[derive(Debug, thiserror::Error)]
enum JobApiError {
    #[error("no file field in upload")]
    MissingFile,
    #[error("invalid multipart upload: {0}")]
    Multipart(String),
    #[error("only .csv files are accepted")]
    NotCsv,
    #[error("failed to store upload: {0}")]
    Store(String),
    #[error("job queue is full, retry later")]
    Saturated,
    #[error("job not found")]
    JobNotFound,
    #[error("invalid filename")]
    InvalidFilename,
    #[error("result file not found")]
    ResultNotFound,
}

impl JobApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            Self::Multipart(_) => (StatusCode::BAD_REQUEST, "INVALID_MULTIPART"),
            Self::NotCsv => (StatusCode::BAD_REQUEST, "INVALID_FILE_TYPE"),
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            Self::Saturated => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL"),
            Self::JobNotFound => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND"),
            Self::InvalidFilename => (StatusCode::BAD_REQUEST, "INVALID_FILENAME"),
            Self::ResultNotFound => (StatusCode::NOT_FOUND, "RESULT_NOT_FOUND"),
        }
    }
}

impl IntoResponse for JobApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorResponse::new(code, self.to_string());
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct UploadAccepted {
    job_id: Uuid,
    message: &'static str,
}

/// Accept a CSV upload and queue it for aggregation
///
/// Returns 202 with the job id; poll `/status/:job_id` for the outcome.
async fn upload_csv(
    State(state): State<FeatureState>,
    mut multipart: Multipart,
) -> Result<Response, JobApiError> {
    let mut stored = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| JobApiError::Multipart(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(sanitize_filename)
            .ok_or(JobApiError::MissingFile)?;
        if !filename.to_lowercase().ends_with(".csv") {
            return Err(JobApiError::NotCsv);
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| JobApiError::Multipart(e.to_string()))?;

        let stored_path = state
            .upload_dir
            .join(format!("{}_{}", Uuid::new_v4(), filename));
        tokio::fs::write(&stored_path, &data)
            .await
            .map_err(|e| JobApiError::Store(e.to_string()))?;

        stored = Some((stored_path, filename, data.len()));
        break;
    }

    let (stored_path, filename, size) = stored.ok_or(JobApiError::MissingFile)?;

    let job_id = match state.engine.submit(stored_path.clone()) {
        Ok(id) => id,
        Err(EngineError::Saturated) => {
            // The engine never saw the file, so remove it here.
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(JobApiError::Saturated);
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(JobApiError::Store(e.to_string()));
        }
    };

    tracing::info!(
        %job_id,
        filename = %filename,
        size_bytes = size,
        "upload accepted, job queued"
    );

    let body = ApiResponse::success(UploadAccepted {
        job_id,
        message: "file accepted for processing",
    });
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// Report the current status of a job
///
/// Unknown and malformed ids both map to 404 so callers cannot
/// distinguish "never existed" from "bad id".
async fn job_status(
    State(state): State<FeatureState>,
    AxumPath(job_id): AxumPath<String>,
) -> Result<Response, JobApiError> {
    let job_id = Uuid::parse_str(&job_id).map_err(|_| JobApiError::JobNotFound)?;
    let job = state.engine.query(job_id).ok_or(JobApiError::JobNotFound)?;
    Ok(Json(job).into_response())
}

/// Stream a finished result file
async fn download_result(
    State(state): State<FeatureState>,
    AxumPath(filename): AxumPath<String>,
) -> Result<Response, JobApiError> {
    // Reject anything that is not a bare filename.
    if Path::new(&filename).file_name() != Some(filename.as_ref()) {
        return Err(JobApiError::InvalidFilename);
    }

    let path = state.engine.result_path(&filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| JobApiError::ResultNotFound)?;

    let stream = ReaderStream::new(file);
    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];

    Ok((headers, Body::from_stream(stream)).into_response())
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
