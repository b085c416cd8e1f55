//! Startup recovery endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use retort_core::domain::job::Job;
use retort_core::dto::recovery::{ApplyRecovery, RecoveryAction, RecoveryReport};

impl OrchestratorClient {
    /// Unfinished jobs left behind by a previous orchestrator run
    pub async fn list_stale_jobs(&self) -> Result<Vec<Job>> {
        let url = format!("{}/api/recovery", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn apply_recovery(&self, action: RecoveryAction) -> Result<RecoveryReport> {
        let url = format!("{}/api/recovery", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ApplyRecovery { action })
            .send()
            .await?;

        self.handle_response(response).await
    }
}
