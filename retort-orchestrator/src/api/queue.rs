//! Queue API Handlers
//!
//! Pause, resume and immediate stop of the scheduler.

use axum::{Json, extract::State};
use retort_core::domain::queue::QueueStatus;
use retort_core::dto::queue::ControlResponse;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /api/queue
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<QueueStatus>> {
    Ok(Json(state.queue.get_queue_status().await?))
}

/// POST /api/queue/pause
pub async fn pause(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    let control = state.queue.pause_queue().await?;
    Ok(Json(control.into()))
}

/// POST /api/queue/resume
pub async fn resume(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    let control = state.queue.resume_queue().await?;
    Ok(Json(control.into()))
}

/// POST /api/queue/stop
/// Queued jobs fail as workers reach them
pub async fn stop_immediate(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    let control = state.queue.stop_queue_immediate().await?;
    Ok(Json(control.into()))
}
