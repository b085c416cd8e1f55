//! Recovery Service
//!
//! After an unclean shutdown the store can still hold Pending and InProgress
//! jobs that no queue knows about. At startup the coordinator finds them, asks
//! a [`RecoveryPrompt`] what to do, and applies that one action to all of them.

use async_trait::async_trait;
use retort_core::domain::job::{Job, JobStatus};
use retort_core::dto::event::QueueEvent;
use retort_core::dto::recovery::{RecoveryAction, RecoveryReport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::repository::JobStore;
use crate::service::events::EventSink;
use crate::service::job_queue::{JobQueue, QueueError};

/// Chooses how stale jobs are resolved
#[async_trait]
pub trait RecoveryPrompt: Send + Sync {
    async fn choose(&self, stale: &[Job]) -> RecoveryAction;
}

/// Always answers with the same action
#[derive(Debug, Clone, Copy)]
pub struct FixedRecoveryPrompt(pub RecoveryAction);

#[async_trait]
impl RecoveryPrompt for FixedRecoveryPrompt {
    async fn choose(&self, _stale: &[Job]) -> RecoveryAction {
        self.0
    }
}

#[derive(Clone)]
pub struct RecoveryCoordinator {
    store: Arc<dyn JobStore>,
    queue: JobQueue,
    events: Arc<dyn EventSink>,
    grace: Duration,
}

impl RecoveryCoordinator {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: JobQueue,
        events: Arc<dyn EventSink>,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            events,
            grace,
        }
    }

    /// Waits out the grace period, then resolves stale jobs if there are any.
    /// The prompt is not consulted when nothing is stale.
    pub async fn run_at_startup(
        &self,
        prompt: &dyn RecoveryPrompt,
    ) -> Result<RecoveryReport, QueueError> {
        tokio::time::sleep(self.grace).await;

        let stale = self.find_stale().await?;
        if stale.is_empty() {
            info!("No unfinished jobs to recover");
            return Ok(RecoveryReport::default());
        }

        warn!("Found {} unfinished jobs from a previous run", stale.len());
        let action = prompt.choose(&stale).await;

        Ok(self.resolve(action, stale).await)
    }

    /// Pending and InProgress jobs in the store that this process is not
    /// queuing or running, oldest first
    pub async fn find_stale(&self) -> Result<Vec<Job>, QueueError> {
        let mut stale = Vec::new();

        for status in [JobStatus::Pending, JobStatus::InProgress] {
            for job in self.store.find_by_status(status).await? {
                if !self.queue.is_tracked(job.id).await {
                    stale.push(job);
                }
            }
        }

        stale.sort_by_key(|job| job.created_at);
        Ok(stale)
    }

    /// Applies `action` to every job that is stale right now
    pub async fn apply(&self, action: RecoveryAction) -> Result<RecoveryReport, QueueError> {
        let stale = self.find_stale().await?;
        Ok(self.resolve(action, stale).await)
    }

    // ===== Helper Functions =====

    async fn resolve(&self, action: RecoveryAction, stale: Vec<Job>) -> RecoveryReport {
        info!("Recovering {} jobs with action {}", stale.len(), action);

        let mut report = RecoveryReport {
            action: Some(action),
            ..RecoveryReport::default()
        };

        for job in &stale {
            let id = job.id;
            let result = match action {
                RecoveryAction::Restart => self.restart(job.clone()).await,
                RecoveryAction::MarkFailed => self.mark_failed(job.clone()).await,
                RecoveryAction::LeaveAsIs => continue,
            };

            match result {
                Ok(()) => report.applied.push(id),
                Err(e) => {
                    error!(job_id = %id, "Failed to recover job: {}", e);
                    report.skipped.push(id);
                }
            }
        }

        report.found = stale;
        report
    }

    async fn restart(&self, mut job: Job) -> Result<(), QueueError> {
        job.reset();
        self.store.save(&job).await?;
        info!(job_id = %job.id, "Restarting interrupted job");
        self.queue.requeue_job(job).await
    }

    async fn mark_failed(&self, mut job: Job) -> Result<(), QueueError> {
        if let Err(e) = job.mark_interrupted() {
            warn!(job_id = %job.id, "Job already finished: {}", e);
            return Ok(());
        }
        self.store.save(&job).await?;
        info!(job_id = %job.id, "Marked interrupted job as failed");
        self.events.emit(QueueEvent::JobUpdate(Box::new(job)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::repository::{SqliteEnvironmentRegistry, SqliteJobStore};
    use crate::service::events::BroadcastEventSink;
    use crate::service::job_queue::QueueConfig;
    use retort_core::domain::job::INTERRUPTED_BY_SHUTDOWN;
    use retort_runner::RunnerSet;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        coordinator: RecoveryCoordinator,
        queue: JobQueue,
        store: Arc<SqliteJobStore>,
    }

    /// Queue starts paused so restarted jobs stay observable
    async fn fixture() -> Fixture {
        let pool = memory_pool().await;
        let store = Arc::new(SqliteJobStore::new(pool.clone()));
        let registry = Arc::new(SqliteEnvironmentRegistry::new(pool));
        let events: Arc<dyn EventSink> = Arc::new(BroadcastEventSink::new(64));

        let queue = JobQueue::start(
            store.clone(),
            registry,
            RunnerSet::empty(),
            events.clone(),
            QueueConfig::default(),
        );
        queue.pause_queue().await.unwrap();

        let coordinator =
            RecoveryCoordinator::new(store.clone(), queue.clone(), events, Duration::ZERO);

        Fixture {
            coordinator,
            queue,
            store,
        }
    }

    /// Persists a job as a crashed process would have left it
    async fn interrupted(store: &SqliteJobStore, name: &str) -> Job {
        let mut job = Job::new("t", name, "python", vec!["run.py".into()], HashMap::new());
        job.start().unwrap();
        job.set_progress(40.0);
        job.append_output("halfway");
        store.create(&job).await.unwrap();
        job
    }

    struct CountingPrompt {
        action: RecoveryAction,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecoveryPrompt for CountingPrompt {
        async fn choose(&self, _stale: &[Job]) -> RecoveryAction {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.action
        }
    }

    #[tokio::test]
    async fn test_nothing_stale_skips_prompt() {
        let f = fixture().await;
        let prompt = CountingPrompt {
            action: RecoveryAction::Restart,
            calls: AtomicUsize::new(0),
        };

        let report = f.coordinator.run_at_startup(&prompt).await.unwrap();
        assert!(report.action.is_none());
        assert!(report.found.is_empty());
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tracked_jobs_are_not_stale() {
        let f = fixture().await;
        let queued = f.queue.create_job("t", "queued", "python", vec![]).await.unwrap();
        let orphan = interrupted(&f.store, "orphan").await;

        let stale = f.coordinator.find_stale().await.unwrap();
        let ids: Vec<_> = stale.iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![orphan.id]);
        assert!(!ids.contains(&queued.id));
    }

    #[tokio::test]
    async fn test_restart_resets_and_requeues() {
        let f = fixture().await;
        let job = interrupted(&f.store, "restart me").await;

        let prompt = FixedRecoveryPrompt(RecoveryAction::Restart);
        let report = f.coordinator.run_at_startup(&prompt).await.unwrap();
        assert_eq!(report.action, Some(RecoveryAction::Restart));
        assert_eq!(report.applied, vec![job.id]);
        assert!(report.skipped.is_empty());

        let stored = f.store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.progress, 0.0);
        assert!(stored.error.is_none());
        assert!(stored.started_at.is_none());
        assert!(stored.completed_at.is_none());
        assert!(stored.terminal_output.is_empty());
        assert_eq!(stored.created_at, job.created_at);
        assert!(f.queue.is_tracked(job.id).await);
    }

    #[tokio::test]
    async fn test_mark_failed() {
        let f = fixture().await;
        let job = interrupted(&f.store, "fail me").await;
        let pending = Job::new("t", "never claimed", "python", vec![], HashMap::new());
        f.store.create(&pending).await.unwrap();

        let report = f.coordinator.apply(RecoveryAction::MarkFailed).await.unwrap();
        assert_eq!(report.applied.len(), 2);

        for id in [job.id, pending.id] {
            let stored = f.store.find_by_id(id).await.unwrap().unwrap();
            assert_eq!(stored.status, JobStatus::Failed);
            assert_eq!(stored.error.as_deref(), Some(INTERRUPTED_BY_SHUTDOWN));
            assert!(stored.completed_at.is_some());
            assert!(!f.queue.is_tracked(id).await);
        }

        assert!(f.coordinator.find_stale().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leave_as_is_changes_nothing() {
        let f = fixture().await;
        let job = interrupted(&f.store, "leave me").await;

        let report = f.coordinator.apply(RecoveryAction::LeaveAsIs).await.unwrap();
        assert_eq!(report.found.len(), 1);
        assert!(report.applied.is_empty());

        let stored = f.store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored, job);
        assert!(!f.queue.is_tracked(job.id).await);
    }
}
