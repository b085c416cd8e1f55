//! ID resolver module
//!
//! Lets users type a short, unambiguous prefix instead of a full job UUID.

use anyhow::{Context, Result, anyhow};
use retort_client::OrchestratorClient;
use retort_core::dto::job::JobQuery;
use uuid::Uuid;

/// Resolve a job ID or prefix to a full UUID
///
/// A full UUID is returned as-is without asking the orchestrator. A prefix
/// is matched against the listed jobs.
pub async fn resolve_job_id(client: &OrchestratorClient, input: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let jobs = client
        .list_jobs(&JobQuery::default())
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(jobs.iter().map(|job| job.id), input)
}

/// Picks the single id starting with `prefix` (case-insensitive)
fn match_prefix(ids: impl IntoIterator<Item = Uuid>, prefix: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }

    let matches: Vec<Uuid> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
