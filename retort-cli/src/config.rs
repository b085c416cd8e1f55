//! CLI configuration

use retort_client::OrchestratorClient;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the orchestrator API
    pub orchestrator_url: String,
}

impl Config {
    pub fn client(&self) -> OrchestratorClient {
        OrchestratorClient::new(&self.orchestrator_url)
    }
}
