//! Job API Handlers
//!
//! Submission, status, cancellation and listing of jobs.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use relay_core::domain::job::JobStatus;
use relay_core::dto::job::{JobAck, JobStatusResponse, SubmitJob};
use serde::Deserialize;

use super::AppState;
use crate::api::error::{ApiError, ApiResult, parse_job_id};
use crate::repository::JobFilter;

/// POST /submit
/// Register a job and start orchestrating it
pub async fn submit_job(
    State(state): State<AppState>,
    req: Result<Json<SubmitJob>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAck>)> {
    let Json(req) = req?;
    tracing::debug!("Submission for {}", req.source_repo);

    let record = state.orchestrator.submit(req).await?;

    Ok((StatusCode::CREATED, Json(JobAck::from(&record))))
}

/// GET /status/{job_id}
/// Current state of a job
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let id = parse_job_id(&job_id)?;
    let record = state.orchestrator.get(id).await?;

    Ok(Json(JobStatusResponse::from(record)))
}

/// POST /cancel/{job_id}
/// Request cancellation; honoured at the job's next checkpoint
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<JobAck>)> {
    let id = parse_job_id(&job_id)?;
    let record = state.orchestrator.cancel(id).await?;

    Ok((StatusCode::ACCEPTED, Json(JobAck::from(&record))))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
}

/// GET /jobs?status=
/// List jobs, oldest first
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<JobStatusResponse>>> {
    let status = query
        .status
        .map(|raw| raw.parse::<JobStatus>().map_err(ApiError::BadRequest))
        .transpose()?;

    let jobs = state.orchestrator.list(JobFilter { status }).await;

    Ok(Json(jobs.into_iter().map(JobStatusResponse::from).collect()))
}
