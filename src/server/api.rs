//! REST API handlers
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/{parallelism}` | submit a JSON array of seed URLs |
//! | GET | `/status/{job_id}` | current job status |
//! | GET | `/result/{job_id}` | image URLs, waits for the job to finish |
//! | GET | `/health` | liveness and job count |

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::jobs::{JobId, JobState, JobTicket, Submission};
use crate::{GleanError, JobError};

use super::AppState;

/// Error body shared by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}

/// One job of a fan-out submission
#[derive(Debug, Serialize)]
pub struct TaskTicketResponse {
    pub job_id: String,
    pub task_number: String,
    pub url: String,
}

/// The single job of a bundled submission
#[derive(Debug, Serialize)]
pub struct BundledTicketResponse {
    pub job_id: String,
    pub task_number: String,
    pub urls: Vec<String>,
}

impl From<JobTicket> for BundledTicketResponse {
    fn from(ticket: JobTicket) -> Self {
        Self {
            job_id: ticket.job_id.to_string(),
            task_number: ticket.task_number.to_string(),
            urls: ticket.urls,
        }
    }
}

impl From<JobTicket> for TaskTicketResponse {
    fn from(ticket: JobTicket) -> Self {
        Self {
            job_id: ticket.job_id.to_string(),
            task_number: ticket.task_number.to_string(),
            url: ticket.urls.into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: &'static str,
    pub urls: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub job_id: String,
    pub result: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub jobs: usize,
}

/// Failure of an API call, rendered as a JSON error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    NotFound,
    BadRequest,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            Self::BadRequest => (StatusCode::BAD_REQUEST, "Bad Request"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::NotFound(_) => Self::NotFound,
            other => {
                tracing::error!("Job error: {}", other);
                Self::Internal
            }
        }
    }
}

impl From<GleanError> for ApiError {
    fn from(error: GleanError) -> Self {
        match error {
            GleanError::BadRequest(reason) => {
                tracing::debug!("Rejected submission: {}", reason);
                Self::BadRequest
            }
            GleanError::Job(job_error) => job_error.into(),
            other => {
                tracing::error!("Request failed: {}", other);
                Self::Internal
            }
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/{parallelism}", post(submit_urls))
        .route("/status/{job_id}", get(job_status))
        .route("/result/{job_id}", get(job_result))
        .fallback(not_found)
        .with_state(state)
}

/// Unmatched routes, including non-integer parallelism
async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        jobs: state.registry.len().await,
    })
}

/// Submit seed URLs
///
/// The body is read as raw bytes so any content type carrying a JSON array
/// of strings is accepted.
async fn submit_urls(
    State(state): State<AppState>,
    Path(parallelism): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let parallelism: u32 = parallelism.parse().map_err(|_| ApiError::NotFound)?;

    let urls: Vec<String> = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Malformed submission body: {}", e);
        ApiError::BadRequest
    })?;

    let submission = state.dispatcher.submit(urls, parallelism).await?;

    let response = match submission {
        Submission::Bundled(ticket) => Json(BundledTicketResponse::from(ticket)).into_response(),
        Submission::FanOut(tickets) => Json(
            tickets
                .into_iter()
                .map(TaskTicketResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
    };

    Ok(response)
}

/// Report a job's status
async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let status = state.registry.status(job_id).await?;

    Ok(Json(StatusResponse {
        job_id: status.job_id.to_string(),
        status: status.state.as_status_str(),
        urls: status.input_urls,
        submitted_at: status.submitted_at,
        worker: status.worker.map(|w| w.to_string()),
        error: status.error.filter(|_| status.state == JobState::Failed),
    }))
}

/// Return a job's image URLs, waiting for it to finish
async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let images = state.registry.result(job_id).await?;

    Ok(Json(ResultResponse {
        job_id: job_id.to_string(),
        result: images.as_ref().clone(),
    }))
}
