//! Environment command handlers

use anyhow::{Result, anyhow};
use clap::Subcommand;
use colored::*;
use retort_client::OrchestratorClient;
use retort_core::domain::environment::EnvironmentKind;
use retort_core::dto::environment::RegisterEnvironment;

#[derive(Subcommand)]
pub enum EnvCommands {
    /// List registered interpreters
    List {
        /// python or r
        #[arg(long)]
        kind: Option<String>,
    },
    /// Register an interpreter found on this machine
    Register {
        /// python or r
        kind: String,
        /// Path to the interpreter executable
        path: String,
        #[arg(long)]
        name: Option<String>,
        /// venv, conda, system, ...
        #[arg(long = "type", default_value = "system")]
        env_type: String,
        #[arg(long)]
        version: Option<String>,
        /// Make it the active interpreter of its kind
        #[arg(long)]
        activate: bool,
    },
    /// Make a registered interpreter the active one
    Activate {
        kind: String,
        path: String,
    },
}

pub async fn handle_env_command(command: EnvCommands, client: &OrchestratorClient) -> Result<()> {
    match command {
        EnvCommands::List { kind } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let environments = client.list_environments(kind).await?;

            if environments.is_empty() {
                println!("{}", "No environments registered.".yellow());
                return Ok(());
            }

            for env in environments {
                let marker = if env.is_active {
                    "●".green()
                } else {
                    "○".dimmed()
                };
                println!(
                    "  {} [{}] {} {} ({}{})",
                    marker,
                    env.kind,
                    env.name.bold(),
                    env.path,
                    env.env_type,
                    env.version.map(|v| format!(" {}", v)).unwrap_or_default()
                );
            }
            Ok(())
        }
        EnvCommands::Register {
            kind,
            path,
            name,
            env_type,
            version,
            activate,
        } => {
            let env = client
                .register_environment(RegisterEnvironment {
                    kind: parse_kind(&kind)?,
                    name: name.unwrap_or_else(|| path.clone()),
                    path,
                    env_type,
                    version,
                    activate,
                })
                .await?;

            println!("{} Registered {} {}", "✓".green(), env.kind, env.path.bold());
            Ok(())
        }
        EnvCommands::Activate { kind, path } => {
            client.activate_environment(parse_kind(&kind)?, &path).await?;
            println!("{} Activated {}", "✓".green(), path.bold());
            Ok(())
        }
    }
}

fn parse_kind(kind: &str) -> Result<EnvironmentKind> {
    kind.parse().map_err(|e: String| anyhow!(e))
}
