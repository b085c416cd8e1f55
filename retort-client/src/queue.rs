//! Queue control endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use retort_core::domain::queue::QueueStatus;
use retort_core::dto::queue::ControlResponse;

impl OrchestratorClient {
    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let url = format!("{}/api/queue", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Stop taking jobs off the queue; running jobs continue
    pub async fn pause_queue(&self) -> Result<ControlResponse> {
        self.control("pause").await
    }

    pub async fn resume_queue(&self) -> Result<ControlResponse> {
        self.control("resume").await
    }

    /// Fail every queued job as workers reach it
    pub async fn stop_queue(&self) -> Result<ControlResponse> {
        self.control("stop").await
    }

    async fn control(&self, action: &str) -> Result<ControlResponse> {
        let url = format!("{}/api/queue/{}", self.base_url, action);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }
}
