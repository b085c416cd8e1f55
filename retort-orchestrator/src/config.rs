//! Orchestrator configuration
//!
//! Server, scheduler and recovery settings, loaded from environment
//! variables with defaults for a local single-user install.

use retort_core::dto::recovery::RecoveryAction;
use std::time::Duration;

use crate::service::job_queue::QueueConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string
    pub database_url: String,

    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// Size of the worker pool
    pub workers: usize,

    /// Capacity of the bounded backlog
    pub queue_capacity: usize,

    /// Output lines in flight between a runner and its worker
    pub output_buffer: usize,

    /// Maximum number of jobs returned by a plain listing
    pub list_limit: i64,

    /// Delay before the startup recovery scan
    pub recovery_grace: Duration,

    /// Resolution applied to unfinished jobs found at startup
    pub recovery_action: RecoveryAction,

    /// Whether an immediate stop also kills jobs that are already running
    pub stop_interrupts_running: bool,

    /// How long shutdown waits for running jobs
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            bind_addr: "127.0.0.1:8080".to_string(),
            workers: 2,
            queue_capacity: 100,
            output_buffer: 64,
            list_limit: 100,
            recovery_grace: Duration::from_millis(1000),
            recovery_action: RecoveryAction::LeaveAsIs,
            stop_interrupts_running: false,
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - DATABASE_URL (default: sqlite://<config dir>/retort/retort.db)
    /// - RETORT_BIND_ADDR (default: 127.0.0.1:8080)
    /// - RETORT_WORKERS (default: 2)
    /// - RETORT_QUEUE_CAPACITY (default: 100)
    /// - RETORT_OUTPUT_BUFFER (default: 64)
    /// - RETORT_LIST_LIMIT (default: 100)
    /// - RETORT_RECOVERY_GRACE_MS (default: 1000)
    /// - RETORT_RECOVERY_ACTION (restart | fail | leave, default: leave)
    /// - RETORT_STOP_INTERRUPTS_RUNNING (default: false)
    /// - RETORT_SHUTDOWN_TIMEOUT_SECS (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => default_database_url()?,
        };

        let mut config = Self::new(database_url);

        if let Ok(addr) = std::env::var("RETORT_BIND_ADDR") {
            config.bind_addr = addr;
        }

        config.workers = parse_var("RETORT_WORKERS")?.unwrap_or(config.workers);
        config.queue_capacity = parse_var("RETORT_QUEUE_CAPACITY")?.unwrap_or(config.queue_capacity);
        config.output_buffer = parse_var("RETORT_OUTPUT_BUFFER")?.unwrap_or(config.output_buffer);
        config.list_limit = parse_var("RETORT_LIST_LIMIT")?.unwrap_or(config.list_limit);

        if let Some(ms) = parse_var::<u64>("RETORT_RECOVERY_GRACE_MS")? {
            config.recovery_grace = Duration::from_millis(ms);
        }

        if let Ok(action) = std::env::var("RETORT_RECOVERY_ACTION") {
            config.recovery_action = action
                .parse()
                .map_err(|e: String| anyhow::anyhow!("RETORT_RECOVERY_ACTION: {}", e))?;
        }

        config.stop_interrupts_running =
            parse_var("RETORT_STOP_INTERRUPTS_RUNNING")?.unwrap_or(config.stop_interrupts_running);

        if let Some(secs) = parse_var::<u64>("RETORT_SHUTDOWN_TIMEOUT_SECS")? {
            config.shutdown_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.database_url.starts_with("sqlite:") {
            anyhow::bail!("database_url must be a sqlite: URL");
        }

        if self.workers == 0 {
            anyhow::bail!("workers must be greater than 0");
        }

        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }

        if self.output_buffer == 0 {
            anyhow::bail!("output_buffer must be greater than 0");
        }

        if self.list_limit <= 0 {
            anyhow::bail!("list_limit must be greater than 0");
        }

        Ok(())
    }

    /// Scheduler settings
    pub fn queue(&self) -> QueueConfig {
        QueueConfig {
            workers: self.workers,
            capacity: self.queue_capacity,
            output_buffer: self.output_buffer,
            list_limit: self.list_limit,
            stop_interrupts_running: self.stop_interrupts_running,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("sqlite://retort.db".to_string())
    }
}

// ===== Helper Functions =====

fn default_database_url() -> anyhow::Result<String> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine the user config directory"))?
        .join("retort");
    std::fs::create_dir_all(&dir)?;
    Ok(format!("sqlite://{}", dir.join("retort.db").display()))
}

fn parse_var<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.list_limit, 100);
        assert_eq!(config.recovery_grace, Duration::from_secs(1));
        assert_eq!(config.recovery_action, RecoveryAction::LeaveAsIs);
        assert!(!config.stop_interrupts_running);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.workers = 0;
        assert!(config.validate().is_err());
        config.workers = 4;

        config.queue_capacity = 0;
        assert!(config.validate().is_err());
        config.queue_capacity = 10;

        config.database_url = "postgres://localhost/retort".to_string();
        assert!(config.validate().is_err());

        config.database_url = "sqlite::memory:".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_queue_settings_follow_config() {
        let mut config = Config::default();
        config.workers = 3;
        config.stop_interrupts_running = true;

        let queue = config.queue();
        assert_eq!(queue.workers, 3);
        assert_eq!(queue.capacity, 100);
        assert!(queue.stop_interrupts_running);
    }
}
