//! Environment registry endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use retort_core::domain::environment::{Environment, EnvironmentKind};
use retort_core::dto::environment::{ActivateEnvironment, RegisterEnvironment};

impl OrchestratorClient {
    /// List registered interpreters, both kinds unless `kind` is given
    pub async fn list_environments(&self, kind: Option<EnvironmentKind>) -> Result<Vec<Environment>> {
        let url = format!("{}/api/environments", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(kind) = kind {
            request = request.query(&[("kind", kind.as_str())]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    pub async fn register_environment(&self, req: RegisterEnvironment) -> Result<Environment> {
        let url = format!("{}/api/environments", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Make `path` the active interpreter of its kind
    pub async fn activate_environment(&self, kind: EnvironmentKind, path: &str) -> Result<()> {
        let url = format!("{}/api/environments/activate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ActivateEnvironment {
                kind,
                path: path.to_string(),
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
