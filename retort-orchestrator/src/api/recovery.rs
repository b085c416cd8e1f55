//! Recovery API Handlers

use axum::{Json, extract::State};
use retort_core::domain::job::Job;
use retort_core::dto::recovery::{ApplyRecovery, RecoveryReport};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /api/recovery
/// Unfinished jobs left by a previous run
pub async fn list_stale(State(state): State<AppState>) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(state.recovery.find_stale().await?))
}

/// POST /api/recovery
pub async fn apply(
    State(state): State<AppState>,
    Json(req): Json<ApplyRecovery>,
) -> ApiResult<Json<RecoveryReport>> {
    tracing::info!("Applying recovery action: {}", req.action);
    Ok(Json(state.recovery.apply(req.action).await?))
}
