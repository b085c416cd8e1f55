//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod environment;
pub mod error;
pub mod health;
pub mod job;
pub mod queue;
pub mod recovery;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::repository::EnvironmentRegistry;
use crate::service::{JobQueue, RecoveryCoordinator};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub recovery: RecoveryCoordinator,
    pub environments: Arc<dyn EnvironmentRegistry>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/api/jobs", post(job::create_job).get(job::list_jobs))
        .route("/api/jobs/{id}", get(job::get_job).delete(job::delete_job))
        .route("/api/jobs/{id}/rerun", post(job::rerun_job))
        .route("/api/jobs/{id}/cancel", post(job::cancel_job))
        // Queue control
        .route("/api/queue", get(queue::get_status))
        .route("/api/queue/pause", post(queue::pause))
        .route("/api/queue/resume", post(queue::resume))
        .route("/api/queue/stop", post(queue::stop_immediate))
        // Recovery
        .route(
            "/api/recovery",
            get(recovery::list_stale).post(recovery::apply),
        )
        // Environments
        .route(
            "/api/environments",
            get(environment::list_environments).post(environment::register_environment),
        )
        .route(
            "/api/environments/activate",
            post(environment::activate_environment),
        )
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::repository::{JobStore, SqliteEnvironmentRegistry, SqliteJobStore};
    use crate::service::{BroadcastEventSink, EventSink, QueueConfig};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use retort_core::domain::job::{Job, JobStatus};
    use retort_runner::RunnerSet;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        queue: JobQueue,
        store: Arc<SqliteJobStore>,
    }

    async fn test_app() -> TestApp {
        let pool = memory_pool().await;
        let store = Arc::new(SqliteJobStore::new(pool.clone()));
        let environments = Arc::new(SqliteEnvironmentRegistry::new(pool));
        let events: Arc<dyn EventSink> = Arc::new(BroadcastEventSink::new(64));

        let queue = JobQueue::start(
            store.clone(),
            environments.clone(),
            RunnerSet::empty(),
            events.clone(),
            QueueConfig::default(),
        );
        let recovery =
            RecoveryCoordinator::new(store.clone(), queue.clone(), events, Duration::ZERO);

        let router = create_router(AppState {
            queue: queue.clone(),
            recovery,
            environments,
        });

        TestApp {
            router,
            queue,
            store,
        }
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let app = test_app().await;
        app.queue.pause_queue().await.unwrap();

        let (status, created) = send(
            &app.router,
            "POST",
            "/api/jobs",
            Some(json!({
                "type": "pca",
                "name": "PCA",
                "command": "python",
                "args": ["pca.py"],
                "parameters": {"outputDir": "/tmp/pca"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["terminalOutput"], json!([]));

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = send(&app.router, "GET", &format!("/api/jobs/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "PCA");
        assert_eq!(fetched["parameters"]["outputDir"], "/tmp/pca");
    }

    #[tokio::test]
    async fn test_create_job_rejects_empty_command() {
        let app = test_app().await;
        let (status, body) = send(
            &app.router,
            "POST",
            "/api/jobs",
            Some(json!({"type": "t", "name": "n", "command": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("command"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let app = test_app().await;
        let uri = format!("/api/jobs/{}", uuid::Uuid::new_v4());

        let (status, body) = send(&app.router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let (status, _) = send(&app.router, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let app = test_app().await;
        app.queue.pause_queue().await.unwrap();
        app.queue
            .create_job("Clustering", "k-means", "python", vec![])
            .await
            .unwrap();
        app.queue
            .create_job("Normalization", "quantile", "python", vec![])
            .await
            .unwrap();

        let (_, all) = send(&app.router, "GET", "/api/jobs", None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, hits) = send(&app.router, "GET", "/api/jobs?q=cluster", None).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["name"], "k-means");

        let (_, done) = send(&app.router, "GET", "/api/jobs?status=completed", None).await;
        assert!(done.as_array().unwrap().is_empty());

        let (status, _) = send(&app.router, "GET", "/api/jobs?status=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_queue_control_conflicts() {
        let app = test_app().await;

        let (status, body) = send(&app.router, "POST", "/api/queue/pause", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "paused");

        let (status, _) = send(&app.router, "POST", "/api/queue/pause", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(&app.router, "POST", "/api/queue/stop", None).await;
        assert_eq!(body["stopImmediate"], true);

        let (_, status_body) = send(&app.router, "GET", "/api/queue", None).await;
        assert_eq!(status_body["paused"], true);
        assert_eq!(status_body["inFlight"], json!([]));

        let (status, body) = send(&app.router, "POST", "/api/queue/resume", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "running");

        let (status, _) = send(&app.router, "POST", "/api/queue/resume", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cancel_idle_job_conflicts() {
        let app = test_app().await;
        app.queue.pause_queue().await.unwrap();
        let job = app.queue.create_job("t", "idle", "python", vec![]).await.unwrap();

        let (status, _) = send(
            &app.router,
            "POST",
            &format!("/api/jobs/{}/cancel", job.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_rerun() {
        let app = test_app().await;
        app.queue.pause_queue().await.unwrap();
        let job = app.queue.create_job("t", "first", "python", vec![]).await.unwrap();

        let (status, rerun) = send(
            &app.router,
            "POST",
            &format!("/api/jobs/{}/rerun", job.id),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rerun["name"], "first (Rerun)");
        assert_ne!(rerun["id"], json!(job.id));
    }

    #[tokio::test]
    async fn test_recovery_endpoints() {
        let app = test_app().await;
        let mut stale = Job::new("t", "stale", "python", vec![], HashMap::new());
        stale.start().unwrap();
        app.store.create(&stale).await.unwrap();

        let (status, found) = send(&app.router, "GET", "/api/recovery", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found[0]["id"], json!(stale.id));

        let (status, report) = send(
            &app.router,
            "POST",
            "/api/recovery",
            Some(json!({"action": "mark_failed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["applied"], json!([stale.id]));

        let stored = app.store.find_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_environment_endpoints() {
        let app = test_app().await;

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/environments",
            Some(json!({
                "kind": "python",
                "name": "venv",
                "path": "/envs/py",
                "type": "venv",
                "activate": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, listed) = send(&app.router, "GET", "/api/environments?kind=python", None).await;
        assert_eq!(listed[0]["path"], "/envs/py");
        assert_eq!(listed[0]["isActive"], true);

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/environments/activate",
            Some(json!({"kind": "r", "path": "/nowhere"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
