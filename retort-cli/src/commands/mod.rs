//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod env;
mod job;
mod queue;
mod recovery;

pub use env::EnvCommands;
pub use job::JobCommands;
pub use queue::QueueCommands;
pub use recovery::RecoveryCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Queue control
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Jobs left unfinished by a previous orchestrator run
    Recovery {
        #[command(subcommand)]
        command: RecoveryCommands,
    },
    /// Python and R interpreter environments
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },
}

/// Routes the command to the appropriate handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Job { command } => job::handle_job_command(command, &client).await,
        Commands::Queue { command } => queue::handle_queue_command(command, &client).await,
        Commands::Recovery { command } => {
            recovery::handle_recovery_command(command, &client).await
        }
        Commands::Env { command } => env::handle_env_command(command, &client).await,
    }
}
