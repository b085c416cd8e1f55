//! Job-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use retort_core::domain::job::{Job, JobStatus};
use retort_core::dto::job::{CreateJob, JobQuery, RerunJob};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Submission
    // =============================================================================

    /// Submit a new job
    ///
    /// # Example
    /// ```no_run
    /// # use retort_client::OrchestratorClient;
    /// # use retort_core::dto::job::CreateJob;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// let job = client.create_job(CreateJob {
    ///     job_type: "pca".into(),
    ///     name: "PCA".into(),
    ///     command: "python".into(),
    ///     args: vec!["pca.py".into()],
    ///     ..Default::default()
    /// }).await?;
    /// println!("Queued {}", job.id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_job(&self, req: CreateJob) -> Result<Job> {
        let url = format!("{}/api/jobs", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Submit a copy of an existing job
    pub async fn rerun_job(&self, job_id: Uuid, req: RerunJob) -> Result<Job> {
        let url = format!("{}/api/jobs/{}/rerun", self.base_url, job_id);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Queries
    // =============================================================================

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List jobs, optionally filtered by status and/or a search string
    pub async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>> {
        let url = format!("{}/api/jobs", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }

    pub async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        self.list_jobs(&JobQuery {
            status: Some(status),
            q: None,
        })
        .await
    }

    // =============================================================================
    // Control
    // =============================================================================

    /// Delete a job; a running job is killed
    pub async fn delete_job(&self, job_id: Uuid) -> Result<()> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Kill the process of a running job
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<()> {
        let url = format!("{}/api/jobs/{}/cancel", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
