use anyhow::Context;
use retort_orchestrator::api::{self, AppState};
use retort_orchestrator::config::Config;
use retort_orchestrator::db;
use retort_orchestrator::repository::{SqliteEnvironmentRegistry, SqliteJobStore};
use retort_orchestrator::service::{
    EventSink, FixedRecoveryPrompt, JobQueue, RecoveryCoordinator, TracingEventSink,
};
use retort_runner::{RunnerConfig, RunnerSet};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retort_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Retort Orchestrator...");

    let config = Config::from_env().context("Invalid orchestrator configuration")?;
    let runner_config = RunnerConfig::from_env().context("Invalid runner configuration")?;

    tracing::info!("Opening database {}", config.database_url);

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to open database")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(SqliteJobStore::new(pool.clone()));
    let environments = Arc::new(SqliteEnvironmentRegistry::new(pool));
    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);

    let queue = JobQueue::start(
        store.clone(),
        environments.clone(),
        RunnerSet::from_config(&runner_config),
        events.clone(),
        config.queue(),
    );

    let recovery = RecoveryCoordinator::new(
        store,
        queue.clone(),
        events,
        config.recovery_grace,
    );

    // Stale jobs from a previous run
    let startup = recovery.clone();
    let prompt = FixedRecoveryPrompt(config.recovery_action);
    tokio::spawn(async move {
        match startup.run_at_startup(&prompt).await {
            Ok(report) if !report.found.is_empty() => tracing::info!(
                "Recovery: {} found, {} applied, {} skipped",
                report.found.len(),
                report.applied.len(),
                report.skipped.len()
            ),
            Ok(_) => {}
            Err(e) => tracing::error!("Startup recovery failed: {}", e),
        }
    });

    let app = api::create_router(AppState {
        queue: queue.clone(),
        recovery,
        environments,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Waiting for running jobs to finish...");

    if tokio::time::timeout(config.shutdown_timeout, queue.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            "Jobs still running after {:?}; they will be recovered on next start",
            config.shutdown_timeout
        );
    }

    tracing::info!("Retort Orchestrator stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
