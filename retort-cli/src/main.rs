//! Retort CLI
//!
//! Command-line interface for the Retort orchestrator: submit and inspect
//! jobs, control the queue, resolve jobs left over from a crash and manage
//! interpreter environments.

mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "retort")]
#[command(about = "Retort job queue CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "RETORT_URL", default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.url,
    };

    handle_command(cli.command, &config).await
}
