//! Environment API Handlers
//!
//! Registry of interpreters that jobs get pinned to. Discovery happens
//! elsewhere; clients register what they found.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use retort_core::domain::environment::{Environment, EnvironmentKind};
use retort_core::dto::environment::{ActivateEnvironment, RegisterEnvironment};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct EnvironmentQuery {
    pub kind: Option<EnvironmentKind>,
}

/// GET /api/environments?kind=
/// Both kinds unless `kind` is given
pub async fn list_environments(
    State(state): State<AppState>,
    Query(query): Query<EnvironmentQuery>,
) -> ApiResult<Json<Vec<Environment>>> {
    let kinds = match query.kind {
        Some(kind) => vec![kind],
        None => vec![EnvironmentKind::Python, EnvironmentKind::R],
    };

    let mut environments = Vec::new();
    for kind in kinds {
        environments.extend(state.environments.list(kind).await?);
    }

    Ok(Json(environments))
}

/// POST /api/environments
pub async fn register_environment(
    State(state): State<AppState>,
    Json(req): Json<RegisterEnvironment>,
) -> ApiResult<(StatusCode, Json<Environment>)> {
    if req.path.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Environment path cannot be empty".to_string(),
        ));
    }

    let environment = Environment {
        kind: req.kind,
        name: req.name,
        path: req.path,
        env_type: req.env_type,
        version: req.version,
        is_active: req.activate,
    };
    state.environments.register(&environment).await?;

    Ok((StatusCode::CREATED, Json(environment)))
}

/// POST /api/environments/activate
pub async fn activate_environment(
    State(state): State<AppState>,
    Json(req): Json<ActivateEnvironment>,
) -> ApiResult<StatusCode> {
    if !state.environments.set_active(req.kind, &req.path).await? {
        return Err(ApiError::NotFound(format!(
            "{} environment {} not found",
            req.kind, req.path
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}
