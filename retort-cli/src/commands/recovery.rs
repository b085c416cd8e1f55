//! Recovery command handlers

use anyhow::{Result, anyhow};
use clap::Subcommand;
use colored::*;
use retort_client::OrchestratorClient;
use retort_core::dto::recovery::RecoveryAction;

#[derive(Subcommand)]
pub enum RecoveryCommands {
    /// List pending and in-progress jobs the orchestrator is not running
    List,
    /// Resolve all of them at once
    Apply {
        /// restart | fail | leave
        action: String,
    },
}

pub async fn handle_recovery_command(
    command: RecoveryCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        RecoveryCommands::List => {
            let jobs = client.list_stale_jobs().await?;
            if jobs.is_empty() {
                println!("{}", "No unfinished jobs.".green());
                return Ok(());
            }

            println!(
                "{}",
                format!("{} unfinished job(s) from a previous run:", jobs.len()).bold()
            );
            for job in jobs {
                println!(
                    "  {} {} {} ({})",
                    "▸".cyan(),
                    job.id.to_string().dimmed(),
                    job.name,
                    job.status.to_string().yellow()
                );
            }
            Ok(())
        }
        RecoveryCommands::Apply { action } => {
            let action: RecoveryAction = action.parse().map_err(|e: String| anyhow!(e))?;
            let report = client.apply_recovery(action).await?;

            println!(
                "{} {} applied to {} of {} job(s)",
                "✓".green(),
                action.to_string().bold(),
                report.applied.len(),
                report.found.len()
            );
            for id in report.skipped {
                println!("  {} could not update {}", "✗".red(), id);
            }
            Ok(())
        }
    }
}
