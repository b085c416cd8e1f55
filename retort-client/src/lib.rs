//! Retort HTTP Client
//!
//! A simple, type-safe HTTP client for the Retort orchestrator API, used by
//! the `retort` CLI and by anything else that wants to submit or watch jobs.
//!
//! # Example
//!
//! ```no_run
//! use retort_client::OrchestratorClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let status = client.queue_status().await?;
//!     println!("{} pending, {} running", status.pending_count, status.in_progress_count);
//!     Ok(())
//! }
//! ```

mod environments;
pub mod error;
mod jobs;
mod queue;
mod recovery;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Retort orchestrator API
///
/// Methods are grouped by resource:
/// - Jobs (create, list, get, delete, rerun, cancel)
/// - Queue control (status, pause, resume, stop)
/// - Startup recovery
/// - Interpreter environments
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use retort_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    /// (timeouts, proxies, TLS settings)
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the orchestrator answers its health check
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Checks the status code, then deserializes the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        tracing::debug!("{} {}", status, response.url());

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// For endpoints that answer with no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        tracing::debug!("{} {}", status, response.url());

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retort_core::domain::environment::EnvironmentKind;
    use retort_core::domain::job::JobStatus;
    use retort_core::dto::environment::RegisterEnvironment;
    use retort_core::dto::job::{CreateJob, RerunJob};
    use retort_orchestrator::api::{AppState, create_router};
    use retort_orchestrator::db;
    use retort_orchestrator::repository::{SqliteEnvironmentRegistry, SqliteJobStore};
    use retort_orchestrator::service::{
        BroadcastEventSink, EventSink, JobQueue, QueueConfig, RecoveryCoordinator,
    };
    use retort_runner::RunnerSet;
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves a fresh orchestrator on an ephemeral port
    async fn spawn_orchestrator() -> (OrchestratorClient, JobQueue) {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let store = Arc::new(SqliteJobStore::new(pool.clone()));
        let environments = Arc::new(SqliteEnvironmentRegistry::new(pool));
        let events: Arc<dyn EventSink> = Arc::new(BroadcastEventSink::new(16));
        let queue = JobQueue::start(
            store.clone(),
            environments.clone(),
            RunnerSet::empty(),
            events.clone(),
            QueueConfig::default(),
        );
        let recovery = RecoveryCoordinator::new(store, queue.clone(), events, Duration::ZERO);

        let app = create_router(AppState {
            queue: queue.clone(),
            recovery,
            environments,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        (OrchestratorClient::new(format!("http://{}/", addr)), queue)
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = OrchestratorClient::with_client("http://localhost:8080", Client::new());
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_job_round_trip() {
        let (client, _queue) = spawn_orchestrator().await;
        client.health().await.unwrap();
        client.pause_queue().await.unwrap();

        let job = client
            .create_job(CreateJob {
                job_type: "pca".into(),
                name: "PCA".into(),
                command: "python".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let fetched = client.get_job(job.id).await.unwrap();
        assert_eq!(fetched.id, job.id);

        let pending = client.list_jobs_by_status(JobStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);

        let rerun = client.rerun_job(job.id, RerunJob::default()).await.unwrap();
        assert_eq!(rerun.name, "PCA (Rerun)");

        let err = client.cancel_job(job.id).await.unwrap_err();
        assert!(err.is_conflict());

        client.delete_job(job.id).await.unwrap();
        assert!(client.get_job(job.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_queue_control() {
        let (client, _queue) = spawn_orchestrator().await;

        let paused = client.pause_queue().await.unwrap();
        assert!(paused.paused);
        assert!(client.pause_queue().await.unwrap_err().is_conflict());

        let stopped = client.stop_queue().await.unwrap();
        assert!(stopped.stop_immediate);

        let status = client.queue_status().await.unwrap();
        assert!(status.paused);
        assert_eq!(status.current_job(), None);

        let resumed = client.resume_queue().await.unwrap();
        assert!(!resumed.paused);
    }

    #[tokio::test]
    async fn test_environments_and_recovery() {
        let (client, _queue) = spawn_orchestrator().await;

        client
            .register_environment(RegisterEnvironment {
                kind: EnvironmentKind::R,
                name: "system R".into(),
                path: "/usr/bin/Rscript".into(),
                env_type: "system".into(),
                version: Some("4.4".into()),
                activate: true,
            })
            .await
            .unwrap();

        let r = client
            .list_environments(Some(EnvironmentKind::R))
            .await
            .unwrap();
        assert_eq!(r.len(), 1);
        assert!(r[0].is_active);
        assert!(
            client
                .list_environments(Some(EnvironmentKind::Python))
                .await
                .unwrap()
                .is_empty()
        );

        let err = client
            .activate_environment(EnvironmentKind::Python, "/missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        assert!(client.list_stale_jobs().await.unwrap().is_empty());
    }
}
