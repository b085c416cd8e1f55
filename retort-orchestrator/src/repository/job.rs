//! Job Repository
//!
//! Durable job records. Collections are stored as JSON text and timestamps
//! as fixed-width RFC 3339 strings so that text ordering is time ordering.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use retort_core::domain::environment::EnvironmentBinding;
use retort_core::domain::job::{Job, JobStatus};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use super::StoreError;

/// Storage contract consumed by the scheduler
///
/// Implementations need not support concurrent writers.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Full-row upsert
    async fn save(&self, job: &Job) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Most recent first
    async fn find_all(&self, limit: i64) -> Result<Vec<Job>, StoreError>;

    /// Oldest first, the order jobs were submitted in
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    async fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError>;

    /// Case-insensitive substring match on name or type, most recent first
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Job>, StoreError>;

    /// Returns whether a row was removed
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

const JOB_COLUMNS: &str = r#"
    id, type, name, status, progress, command, args, parameters,
    python_env_path, python_env_type, r_env_path, r_env_type,
    output_path, terminal_output, created_at, started_at, completed_at, error
"#;

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write(&self, job: &Job, upsert: bool) -> Result<(), StoreError> {
        let conflict = if upsert {
            r#"
            ON CONFLICT(id) DO UPDATE SET
                type = excluded.type,
                name = excluded.name,
                status = excluded.status,
                progress = excluded.progress,
                command = excluded.command,
                args = excluded.args,
                parameters = excluded.parameters,
                python_env_path = excluded.python_env_path,
                python_env_type = excluded.python_env_type,
                r_env_path = excluded.r_env_path,
                r_env_type = excluded.r_env_type,
                output_path = excluded.output_path,
                terminal_output = excluded.terminal_output,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                error = excluded.error
            "#
        } else {
            ""
        };

        let sql = format!(
            r#"
            INSERT INTO jobs ({JOB_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            {conflict}
            "#
        );

        sqlx::query(&sql)
            .bind(job.id.to_string())
            .bind(&job.job_type)
            .bind(&job.name)
            .bind(job.status.as_str())
            .bind(job.progress)
            .bind(&job.command)
            .bind(serde_json::to_string(&job.args)?)
            .bind(serde_json::to_string(&job.parameters)?)
            .bind(job.python_env.as_ref().map(|env| env.path.as_str()))
            .bind(job.python_env.as_ref().map(|env| env.env_type.as_str()))
            .bind(job.r_env.as_ref().map(|env| env.path.as_str()))
            .bind(job.r_env.as_ref().map(|env| env.env_type.as_str()))
            .bind(job.output_path.as_deref())
            .bind(serde_json::to_string(&job.terminal_output)?)
            .bind(encode_time(&job.created_at))
            .bind(job.started_at.as_ref().map(encode_time))
            .bind(job.completed_at.as_ref().map(encode_time))
            .bind(job.error.as_deref())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        self.write(job, false).await
    }

    async fn save(&self, job: &Job) -> Result<(), StoreError> {
        self.write(job, true).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn find_all(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ? ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Job>, StoreError> {
        let pattern = format!("%{}%", query.to_lowercase());

        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE LOWER(name) LIKE ? OR LOWER(type) LIKE ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ===== Helper Functions =====

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    #[sqlx(rename = "type")]
    job_type: String,
    name: String,
    status: String,
    progress: f64,
    command: String,
    args: Option<String>,
    parameters: Option<String>,
    python_env_path: Option<String>,
    python_env_type: Option<String>,
    r_env_path: Option<String>,
    r_env_type: Option<String>,
    output_path: Option<String>,
    terminal_output: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    error: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::Corrupt(format!("job id '{}': {}", row.id, e)))?;
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Corrupt(format!("job {}: {}", id, e)))?;

        Ok(Job {
            id,
            job_type: row.job_type,
            name: row.name,
            status,
            progress: row.progress,
            command: row.command,
            args: decode_json(row.args.as_deref()),
            parameters: decode_json::<HashMap<String, serde_json::Value>>(row.parameters.as_deref()),
            python_env: decode_binding(row.python_env_path, row.python_env_type),
            r_env: decode_binding(row.r_env_path, row.r_env_type),
            output_path: row.output_path,
            terminal_output: decode_json(row.terminal_output.as_deref()),
            created_at: decode_time(&row.created_at)?,
            started_at: row.started_at.as_deref().map(decode_time).transpose()?,
            completed_at: row.completed_at.as_deref().map(decode_time).transpose()?,
            error: row.error.filter(|e| !e.is_empty()),
        })
    }
}

/// NULL or unreadable collections come back empty
fn decode_json<T: serde::de::DeserializeOwned + Default>(raw: Option<&str>) -> T {
    match raw {
        Some(text) if !text.is_empty() => serde_json::from_str(text).unwrap_or_else(|e| {
            tracing::warn!("Discarding malformed JSON column: {}", e);
            T::default()
        }),
        _ => T::default(),
    }
}

fn decode_binding(path: Option<String>, env_type: Option<String>) -> Option<EnvironmentBinding> {
    path.filter(|p| !p.is_empty())
        .map(|path| EnvironmentBinding::new(path, env_type.unwrap_or_default()))
}

fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}
