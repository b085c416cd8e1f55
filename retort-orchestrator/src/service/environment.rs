//! Environment Service
//!
//! Pins interpreters to jobs at submission and re-checks them when a worker
//! claims the job.

use retort_core::domain::environment::{EnvironmentBinding, EnvironmentKind};
use std::path::Path;
use thiserror::Error;

use crate::repository::{EnvironmentRegistry, StoreError};

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Python environment not found: {path} (type: {env_type}). Please select a new environment")]
    PythonNotFound { path: String, env_type: String },

    #[error("R environment not found: {path} (type: {env_type}). Please select a new environment")]
    RNotFound { path: String, env_type: String },

    #[error("failed to get {kind} environments: {source}")]
    Lookup {
        kind: EnvironmentKind,
        #[source]
        source: StoreError,
    },
}

/// Interpreters a command needs: `python` and `r` need their own kind, any
/// other command may use both.
pub fn kinds_for_command(command: &str) -> &'static [EnvironmentKind] {
    match command {
        "python" => &[EnvironmentKind::Python],
        "r" => &[EnvironmentKind::R],
        _ => &[EnvironmentKind::Python, EnvironmentKind::R],
    }
}

/// Bindings from the currently active environments.
///
/// A kind with no active environment, or whose lookup fails, stays unbound.
pub async fn resolve_active_bindings(
    registry: &dyn EnvironmentRegistry,
    command: &str,
) -> (Option<EnvironmentBinding>, Option<EnvironmentBinding>) {
    let mut python = None;
    let mut r = None;

    for &kind in kinds_for_command(command) {
        let binding = match registry.active(kind).await {
            Ok(active) => active.map(|env| env.binding()),
            Err(e) => {
                tracing::warn!("Could not read active {} environment: {}", kind, e);
                None
            }
        };

        match kind {
            EnvironmentKind::Python => python = binding,
            EnvironmentKind::R => r = binding,
        }
    }

    (python, r)
}

/// Binding for an explicitly chosen interpreter, with its type looked up in
/// the registry (empty when unknown).
pub async fn binding_for_path(
    registry: &dyn EnvironmentRegistry,
    kind: EnvironmentKind,
    path: &str,
) -> Option<EnvironmentBinding> {
    if path.is_empty() {
        return None;
    }

    let env_type = match registry.list(kind).await {
        Ok(envs) => envs
            .into_iter()
            .find(|env| env.path == path)
            .map(|env| env.env_type)
            .unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Could not list {} environments: {}", kind, e);
            String::new()
        }
    };

    Some(EnvironmentBinding::new(path, env_type))
}

/// Checks that the interpreters pinned to a job are still usable.
///
/// A Python binding must still be registered. An R binding must also still
/// exist on disk.
pub async fn validate_bindings(
    registry: &dyn EnvironmentRegistry,
    python: Option<&EnvironmentBinding>,
    r: Option<&EnvironmentBinding>,
) -> Result<(), EnvironmentError> {
    if let Some(binding) = python {
        if !is_registered(registry, EnvironmentKind::Python, &binding.path).await? {
            return Err(EnvironmentError::PythonNotFound {
                path: binding.path.clone(),
                env_type: binding.env_type.clone(),
            });
        }
    }

    if let Some(binding) = r {
        let missing = || EnvironmentError::RNotFound {
            path: binding.path.clone(),
            env_type: binding.env_type.clone(),
        };

        if !Path::new(&binding.path).exists() {
            return Err(missing());
        }

        if !is_registered(registry, EnvironmentKind::R, &binding.path).await? {
            return Err(missing());
        }
    }

    Ok(())
}

async fn is_registered(
    registry: &dyn EnvironmentRegistry,
    kind: EnvironmentKind,
    path: &str,
) -> Result<bool, EnvironmentError> {
    let envs = registry
        .list(kind)
        .await
        .map_err(|source| EnvironmentError::Lookup { kind, source })?;

    Ok(envs.iter().any(|env| env.path == path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::repository::SqliteEnvironmentRegistry;
    use retort_core::domain::environment::Environment;

    fn env(kind: EnvironmentKind, path: &str, active: bool) -> Environment {
        Environment {
            kind,
            name: path.to_string(),
            path: path.to_string(),
            env_type: "system".to_string(),
            version: None,
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_resolution_follows_command() {
        let registry = SqliteEnvironmentRegistry::new(memory_pool().await);
        registry
            .register(&env(EnvironmentKind::Python, "/py", true))
            .await
            .unwrap();
        registry
            .register(&env(EnvironmentKind::R, "/rscript", true))
            .await
            .unwrap();

        let (python, r) = resolve_active_bindings(&registry, "python").await;
        assert_eq!(python.unwrap().path, "/py");
        assert!(r.is_none());

        let (python, r) = resolve_active_bindings(&registry, "r").await;
        assert!(python.is_none());
        assert_eq!(r.unwrap().path, "/rscript");

        let (python, r) = resolve_active_bindings(&registry, "direct").await;
        assert!(python.is_some());
        assert!(r.is_some());
    }

    #[tokio::test]
    async fn test_binding_type_lookup() {
        let registry = SqliteEnvironmentRegistry::new(memory_pool().await);
        registry
            .register(&env(EnvironmentKind::Python, "/py", false))
            .await
            .unwrap();

        let known = binding_for_path(&registry, EnvironmentKind::Python, "/py").await;
        assert_eq!(known.unwrap().env_type, "system");

        let unknown = binding_for_path(&registry, EnvironmentKind::Python, "/other").await;
        assert_eq!(unknown.unwrap().env_type, "");

        assert!(binding_for_path(&registry, EnvironmentKind::R, "").await.is_none());
    }

    #[tokio::test]
    async fn test_validation_messages() {
        let registry = SqliteEnvironmentRegistry::new(memory_pool().await);

        let python = EnvironmentBinding::new("/gone/python", "venv");
        let err = validate_bindings(&registry, Some(&python), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Python environment not found: /gone/python (type: venv). Please select a new environment"
        );

        let r = EnvironmentBinding::new("/gone/Rscript", "system");
        let err = validate_bindings(&registry, None, Some(&r)).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::RNotFound { .. }));
    }

    #[tokio::test]
    async fn test_r_binding_must_exist_and_be_registered() {
        let dir = tempfile::tempdir().unwrap();
        let rscript = dir.path().join("Rscript");
        std::fs::write(&rscript, "").unwrap();
        let path = rscript.to_string_lossy().to_string();

        let registry = SqliteEnvironmentRegistry::new(memory_pool().await);
        let binding = EnvironmentBinding::new(path.clone(), "system");

        // On disk but not registered
        assert!(validate_bindings(&registry, None, Some(&binding)).await.is_err());

        registry
            .register(&env(EnvironmentKind::R, &path, true))
            .await
            .unwrap();
        assert!(validate_bindings(&registry, None, Some(&binding)).await.is_ok());
    }
}
