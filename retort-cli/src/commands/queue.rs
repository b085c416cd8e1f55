//! Queue command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use retort_client::OrchestratorClient;
use retort_core::dto::queue::ControlResponse;

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Show the queue state and job counts
    Status,
    /// Stop taking new jobs; running jobs finish
    Pause,
    /// Resume processing and pick up pending jobs
    Resume,
    /// Fail every queued job as workers reach it
    Stop,
}

pub async fn handle_queue_command(
    command: QueueCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        QueueCommands::Status => show_status(client).await,
        QueueCommands::Pause => {
            let response = client.pause_queue().await?;
            print_control("Queue paused", &response);
            Ok(())
        }
        QueueCommands::Resume => {
            let response = client.resume_queue().await?;
            print_control("Queue resumed", &response);
            Ok(())
        }
        QueueCommands::Stop => {
            let response = client.stop_queue().await?;
            print_control("Queue stopped; queued jobs will fail", &response);
            Ok(())
        }
    }
}

async fn show_status(client: &OrchestratorClient) -> Result<()> {
    let status = client.queue_status().await?;

    let state = if status.stop_immediate {
        "stopped".red()
    } else if status.paused {
        "paused".yellow()
    } else {
        "running".green()
    };

    println!("{}", "Queue Status:".bold());
    println!("  State:        {}", state);
    println!("  Pending:      {}", status.pending_count);
    println!("  In progress:  {}", status.in_progress_count);
    println!("  Backlog:      {}", status.backlog);

    if status.in_flight.is_empty() {
        println!("  Running:      {}", "none".dimmed());
    } else {
        println!("  Running:");
        for id in &status.in_flight {
            println!("    {} {}", "▸".cyan(), id);
        }
    }

    Ok(())
}

fn print_control(message: &str, response: &ControlResponse) {
    println!("{} {}", "✓".green(), message.bold());
    println!(
        "  paused={} stop_immediate={}",
        response.paused, response.stop_immediate
    );
}
