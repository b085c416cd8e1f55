//! Job API Handlers
//!
//! HTTP endpoints for job submission, inspection and control.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use retort_core::domain::job::Job;
use retort_core::dto::job::{CreateJob, JobQuery, RerunJob};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /api/jobs
/// Submit a new job
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Job name cannot be empty".to_string()));
    }
    if req.command.trim().is_empty() {
        return Err(ApiError::BadRequest("Job command cannot be empty".to_string()));
    }

    tracing::info!("Submitting job: {} ({})", req.name, req.command);

    let job = state.queue.create_job_with_parameters(req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs?status=&q=
/// List jobs; `q` searches name and type, `status` filters by status
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let jobs = match (query.q.as_deref(), query.status) {
        (Some(q), status) => {
            tracing::debug!("Searching jobs: {}", q);
            let mut jobs = state.queue.search_jobs(q).await?;
            if let Some(status) = status {
                jobs.retain(|job| job.status == status);
            }
            jobs
        }
        (None, Some(status)) => {
            tracing::debug!("Listing {} jobs", status);
            state.queue.get_jobs_by_status(status).await?
        }
        (None, None) => {
            tracing::debug!("Listing all jobs");
            state.queue.get_all_jobs().await?
        }
    };

    Ok(Json(jobs))
}

/// GET /api/jobs/{id}
pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);
    Ok(Json(state.queue.get_job(id).await?))
}

/// DELETE /api/jobs/{id}
/// Delete a job whatever its status; a running job is killed first
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting job: {}", id);
    state.queue.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/jobs/{id}/rerun
/// Submit a copy of an existing job
pub async fn rerun_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RerunJob>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    tracing::info!("Rerunning job: {}", id);
    let job = state.queue.rerun_job(id, req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// POST /api/jobs/{id}/cancel
/// Kill the process of a running job
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Cancelling job: {}", id);
    state.queue.cancel_job(id).await?;
    Ok(StatusCode::ACCEPTED)
}
