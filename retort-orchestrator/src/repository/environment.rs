//! Environment Repository
//!
//! Registered Python and R interpreters, one table per kind. Registration
//! and discovery of interpreters happen outside the orchestrator; this is
//! only the record of what is known and which one is active.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use retort_core::domain::environment::{Environment, EnvironmentKind};
use sqlx::SqlitePool;

use super::StoreError;

#[async_trait]
pub trait EnvironmentRegistry: Send + Sync {
    /// Inserts or updates the environment with the same kind and path
    async fn register(&self, environment: &Environment) -> Result<(), StoreError>;

    /// Makes `path` the only active environment of its kind.
    /// Returns `false` when no such environment is registered.
    async fn set_active(&self, kind: EnvironmentKind, path: &str) -> Result<bool, StoreError>;

    /// Active environment first, then newest
    async fn list(&self, kind: EnvironmentKind) -> Result<Vec<Environment>, StoreError>;

    async fn active(&self, kind: EnvironmentKind) -> Result<Option<Environment>, StoreError>;
}

pub struct SqliteEnvironmentRegistry {
    pool: SqlitePool,
}

impl SqliteEnvironmentRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnvironmentRegistry for SqliteEnvironmentRegistry {
    async fn register(&self, environment: &Environment) -> Result<(), StoreError> {
        let table = table(environment.kind);
        let mut tx = self.pool.begin().await?;

        if environment.is_active {
            sqlx::query(&format!("UPDATE {table} SET is_active = 0"))
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (path, name, type, version, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                name = excluded.name,
                type = excluded.type,
                version = excluded.version,
                is_active = excluded.is_active
            "#
        ))
        .bind(&environment.path)
        .bind(&environment.name)
        .bind(&environment.env_type)
        .bind(environment.version.as_deref())
        .bind(environment.is_active)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Registered {} environment {} at {}",
            environment.kind,
            environment.name,
            environment.path
        );
        Ok(())
    }

    async fn set_active(&self, kind: EnvironmentKind, path: &str) -> Result<bool, StoreError> {
        let table = table(kind);
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> =
            sqlx::query_scalar(&format!("SELECT path FROM {table} WHERE path = ?"))
                .bind(path)
                .fetch_optional(&mut *tx)
                .await?;

        if exists.is_none() {
            return Ok(false);
        }

        sqlx::query(&format!(
            "UPDATE {table} SET is_active = CASE WHEN path = ? THEN 1 ELSE 0 END"
        ))
        .bind(path)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Activated {} environment {}", kind, path);
        Ok(true)
    }

    async fn list(&self, kind: EnvironmentKind) -> Result<Vec<Environment>, StoreError> {
        let rows = sqlx::query_as::<_, EnvironmentRow>(&format!(
            r#"
            SELECT path, name, type, version, is_active FROM {}
            ORDER BY is_active DESC, created_at DESC
            "#,
            table(kind)
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.into_environment(kind)).collect())
    }

    async fn active(&self, kind: EnvironmentKind) -> Result<Option<Environment>, StoreError> {
        let row = sqlx::query_as::<_, EnvironmentRow>(&format!(
            "SELECT path, name, type, version, is_active FROM {} WHERE is_active = 1 LIMIT 1",
            table(kind)
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.into_environment(kind)))
    }
}

// ===== Helper Functions =====

fn table(kind: EnvironmentKind) -> &'static str {
    match kind {
        EnvironmentKind::Python => "python_environments",
        EnvironmentKind::R => "r_environments",
    }
}

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    path: String,
    name: String,
    #[sqlx(rename = "type")]
    env_type: String,
    version: Option<String>,
    is_active: bool,
}

impl EnvironmentRow {
    fn into_environment(self, kind: EnvironmentKind) -> Environment {
        Environment {
            kind,
            name: self.name,
            path: self.path,
            env_type: self.env_type,
            version: self.version,
            is_active: self.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn python(path: &str, active: bool) -> Environment {
        Environment {
            kind: EnvironmentKind::Python,
            name: format!("env {}", path),
            path: path.to_string(),
            env_type: "venv".to_string(),
            version: Some("3.12".to_string()),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_register_upserts_by_path() {
        let registry = SqliteEnvironmentRegistry::new(memory_pool().await);
        registry.register(&python("/a/python", false)).await.unwrap();

        let mut updated = python("/a/python", false);
        updated.env_type = "conda".to_string();
        registry.register(&updated).await.unwrap();

        let all = registry.list(EnvironmentKind::Python).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].env_type, "conda");
    }

    #[tokio::test]
    async fn test_single_active_per_kind() {
        let registry = SqliteEnvironmentRegistry::new(memory_pool().await);
        registry.register(&python("/a/python", true)).await.unwrap();
        registry.register(&python("/b/python", true)).await.unwrap();

        let active = registry.active(EnvironmentKind::Python).await.unwrap().unwrap();
        assert_eq!(active.path, "/b/python");

        assert!(registry.set_active(EnvironmentKind::Python, "/a/python").await.unwrap());
        let all = registry.list(EnvironmentKind::Python).await.unwrap();
        assert_eq!(all[0].path, "/a/python");
        assert!(all[0].is_active);
        assert_eq!(all.iter().filter(|env| env.is_active).count(), 1);

        // Kinds are independent
        assert!(registry.active(EnvironmentKind::R).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_active_unknown_path() {
        let registry = SqliteEnvironmentRegistry::new(memory_pool().await);
        registry.register(&python("/a/python", true)).await.unwrap();

        assert!(!registry.set_active(EnvironmentKind::Python, "/missing").await.unwrap());
        let active = registry.active(EnvironmentKind::Python).await.unwrap().unwrap();
        assert_eq!(active.path, "/a/python");
    }
}
