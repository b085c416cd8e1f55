//! Health Check API Handler
//!
//! Liveness probe; answers as long as the server accepts requests.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
