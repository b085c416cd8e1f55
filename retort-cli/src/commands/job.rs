//! Job command handlers
//!
//! Submitting, listing and inspecting jobs, plus per-job control
//! (delete, rerun, cancel).

use anyhow::{Result, anyhow};
use clap::Subcommand;
use colored::*;
use retort_client::OrchestratorClient;
use retort_core::domain::job::{Job, JobStatus};
use retort_core::dto::job::{CreateJob, JobQuery, RerunJob};
use std::collections::HashMap;

use crate::id_resolver::resolve_job_id;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Submit a job
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// Analysis type label
        #[arg(long = "type")]
        job_type: String,
        /// Runner: python, r or direct
        #[arg(long, default_value = "python")]
        command: String,
        /// Python interpreter to pin instead of the active one
        #[arg(long)]
        python: Option<String>,
        /// R interpreter to pin instead of the active one
        #[arg(long)]
        r: Option<String>,
        /// Parameter as key=value; values are parsed as JSON when possible
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Script or program, followed by its arguments
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// List jobs, most recent first
    List {
        /// pending, in_progress, completed or failed
        #[arg(long)]
        status: Option<String>,
        /// Case-insensitive match on name or type
        #[arg(long)]
        search: Option<String>,
    },
    /// Get job details
    Get {
        /// Job ID or unambiguous prefix
        id: String,
        /// Also print the captured terminal output
        #[arg(short, long)]
        output: bool,
    },
    /// Delete a job; a running job is killed
    Delete {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Submit a copy of a job
    Rerun {
        /// Job ID or unambiguous prefix
        id: String,
        /// Python interpreter for the copy (default: same as the original)
        #[arg(long)]
        python: Option<String>,
        /// R interpreter for the copy (default: same as the original)
        #[arg(long)]
        r: Option<String>,
    },
    /// Kill a running job
    Cancel {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Routes job subcommands to their respective handlers
pub async fn handle_job_command(command: JobCommands, client: &OrchestratorClient) -> Result<()> {
    match command {
        JobCommands::Create {
            name,
            job_type,
            command,
            python,
            r,
            params,
            args,
        } => {
            let request = CreateJob {
                job_type,
                name,
                command,
                args,
                parameters: parse_params(&params)?,
                python_path: python,
                r_path: r,
            };
            create_job(client, request).await
        }
        JobCommands::List { status, search } => list_jobs(client, status, search).await,
        JobCommands::Get { id, output } => get_job(client, &id, output).await,
        JobCommands::Delete { id } => {
            let uuid = resolve_job_id(client, &id).await?;
            client.delete_job(uuid).await?;
            println!("{} Deleted job {}", "✓".green(), uuid);
            Ok(())
        }
        JobCommands::Rerun { id, python, r } => rerun_job(client, &id, python, r).await,
        JobCommands::Cancel { id } => {
            let uuid = resolve_job_id(client, &id).await?;
            client.cancel_job(uuid).await?;
            println!("{} Cancellation requested for {}", "✓".green(), uuid);
            Ok(())
        }
    }
}

async fn create_job(client: &OrchestratorClient, request: CreateJob) -> Result<()> {
    let job = client.create_job(request).await?;

    println!("{} Job queued", "✓".green());
    println!("  ID:     {}", job.id.to_string().cyan());
    println!("  Status: {}", colorize_status(&job.status));

    Ok(())
}

async fn list_jobs(
    client: &OrchestratorClient,
    status: Option<String>,
    search: Option<String>,
) -> Result<()> {
    let status = status
        .map(|s| s.parse::<JobStatus>().map_err(|e| anyhow!(e)))
        .transpose()?;

    let jobs = client.list_jobs(&JobQuery { status, q: search }).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

async fn get_job(client: &OrchestratorClient, id: &str, output: bool) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;
    let job = client.get_job(uuid).await?;

    print_job_details(&job);

    if output {
        println!("\n{}", "Output:".bold());
        println!("{}", "─".repeat(80).dimmed());
        for line in &job.terminal_output {
            match line.strip_prefix("[ERROR] ") {
                Some(stderr) => println!("{}", stderr.red()),
                None => println!("{}", line),
            }
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

async fn rerun_job(
    client: &OrchestratorClient,
    id: &str,
    python: Option<String>,
    r: Option<String>,
) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;

    let request = RerunJob {
        use_same_environment: python.is_none() && r.is_none(),
        python_path: python,
        r_path: r,
    };
    let job = client.rerun_job(uuid, request).await?;

    println!("{} Rerun queued as {}", "✓".green(), job.id.to_string().cyan());
    Ok(())
}

// ===== Helper Functions =====

fn parse_params(params: &[String]) -> Result<HashMap<String, serde_json::Value>> {
    params
        .iter()
        .map(|param| {
            let (key, raw) = param
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid parameter '{}': expected KEY=VALUE", param))?;
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}

fn print_job_summary(job: &Job) {
    println!("  {} {} {}", "▸".cyan(), job.name.bold(), job.id.to_string().dimmed());
    println!("    Type:     {}", job.job_type);
    println!("    Status:   {}", colorize_status(&job.status));
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Name:        {}", job.name);
    println!("  Type:        {}", job.job_type);
    println!("  Status:      {}", colorize_status(&job.status));
    println!("  Progress:    {:.0}%", job.progress);
    println!("  Command:     {} {}", job.command, job.args.join(" "));
    println!("  Created:     {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(started) = job.started_at {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(completed) = job.completed_at {
        println!("  Completed:   {}", completed.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.started_at {
            let seconds = completed.signed_duration_since(started).num_seconds();
            println!("  Duration:    {}s", seconds);
        }
    }

    if let Some(env) = &job.python_env {
        println!("  Python:      {} ({})", env.path, env.env_type);
    }
    if let Some(env) = &job.r_env {
        println!("  R:           {} ({})", env.path, env.env_type);
    }
    if let Some(path) = &job.output_path {
        println!("  Output:      {}", path);
    }

    if !job.parameters.is_empty() {
        println!("\n{}", "Parameters:".bold());
        for (key, value) in &job.parameters {
            println!("  {} = {}", key.cyan(), value);
        }
    }

    if let Some(error) = &job.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

fn colorize_status(status: &JobStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        JobStatus::Pending => label.yellow(),
        JobStatus::InProgress => label.cyan(),
        JobStatus::Completed => label.green(),
        JobStatus::Failed => label.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&[
            "outputDir=/tmp/out".to_string(),
            "k=3".to_string(),
            "flags=[\"a\",\"b\"]".to_string(),
        ])
        .unwrap();

        assert_eq!(params["outputDir"], json!("/tmp/out"));
        assert_eq!(params["k"], json!(3));
        assert_eq!(params["flags"], json!(["a", "b"]));
    }

    #[test]
    fn test_parse_params_requires_equals() {
        assert!(parse_params(&["oops".to_string()]).is_err());
    }
}
