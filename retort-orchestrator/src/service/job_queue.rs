//! Job Queue Service
//!
//! Accepts jobs, queues their ids on a bounded channel and runs them on a
//! fixed pool of workers.
//!
//! The store is the source of truth for job content. One lock guards the
//! control state, the read cache, the set of admitted ids (queued, held or
//! running) and the in-flight table; a `watch` channel mirrors the control
//! state so paused workers sleep until the state changes.

use retort_core::domain::environment::EnvironmentKind;
use retort_core::domain::job::{CANCELLED_BY_USER, Job, JobStatus, STOPPED_BY_USER};
use retort_core::domain::queue::{ControlError, ControlState, QueueStatus};
use retort_core::dto::event::QueueEvent;
use retort_core::dto::job::{CreateJob, RerunJob};
use retort_runner::{Invocation, RunnerError, RunnerKind, RunnerSet};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repository::{EnvironmentRegistry, JobStore, StoreError};
use crate::service::environment;
use crate::service::events::EventSink;

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
    pub output_buffer: usize,
    pub list_limit: i64,
    pub stop_interrupts_running: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 100,
            output_buffer: 64,
            list_limit: 100,
            stop_interrupts_running: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    State(#[from] ControlError),

    #[error("job {0} is not running")]
    NotRunning(Uuid),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("job queue is shut down")]
    Closed,
}

/// Handle to the scheduler; cheap to clone
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn JobStore>,
    environments: Arc<dyn EnvironmentRegistry>,
    runners: RunnerSet,
    events: Arc<dyn EventSink>,
    config: QueueConfig,
    state: RwLock<QueueState>,
    control: watch::Sender<ControlState>,
    sender: mpsc::Sender<Uuid>,
    receiver: Mutex<mpsc::Receiver<Uuid>>,
    shutdown: CancellationToken,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Default)]
struct QueueState {
    control: ControlState,
    /// Latest snapshot of every admitted job
    cache: HashMap<Uuid, Job>,
    /// Ids that are queued, held by a paused worker, or running
    admitted: HashSet<Uuid>,
    in_flight: HashMap<Uuid, InFlight>,
}

struct InFlight {
    cancel: CancellationToken,
    /// Deleted while running; nothing more gets written for it
    deleted: bool,
}

impl JobQueue {
    /// Creates the queue and spawns its workers
    pub fn start(
        store: Arc<dyn JobStore>,
        environments: Arc<dyn EnvironmentRegistry>,
        runners: RunnerSet,
        events: Arc<dyn EventSink>,
        config: QueueConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let (control, _) = watch::channel(ControlState::Running);
        let workers = config.workers.max(1);

        let inner = Arc::new(Inner {
            store,
            environments,
            runners,
            events,
            config,
            state: RwLock::new(QueueState::default()),
            control,
            sender,
            receiver: Mutex::new(receiver),
            shutdown: CancellationToken::new(),
            workers: std::sync::Mutex::new(Vec::new()),
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker| tokio::spawn(worker_loop(inner.clone(), worker)))
            .collect();
        inner
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(handles);

        info!("Job queue started with {} workers", workers);

        Self { inner }
    }

    // ===== Submission =====

    /// Submits a job with no parameters
    pub async fn create_job(
        &self,
        job_type: impl Into<String>,
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Result<Job, QueueError> {
        self.create_job_with_parameters(CreateJob {
            job_type: job_type.into(),
            name: name.into(),
            command: command.into(),
            args,
            ..CreateJob::default()
        })
        .await
    }

    /// Pins the interpreters, persists a Pending job and queues it
    pub async fn create_job_with_parameters(&self, request: CreateJob) -> Result<Job, QueueError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let registry = self.inner.environments.as_ref();
        let (mut python, mut r) =
            environment::resolve_active_bindings(registry, &request.command).await;

        if let Some(path) = request.python_path.as_deref() {
            python = environment::binding_for_path(registry, EnvironmentKind::Python, path).await;
        }
        if let Some(path) = request.r_path.as_deref() {
            r = environment::binding_for_path(registry, EnvironmentKind::R, path).await;
        }

        let job = Job::new(
            request.job_type,
            request.name,
            request.command,
            request.args,
            request.parameters,
        )
        .with_environments(python, r);

        // Tracked before the row exists so recovery never sees it as stale
        self.reserve(job.id).await?;
        if let Err(e) = self.inner.store.create(&job).await {
            self.inner.release(job.id).await;
            return Err(e.into());
        }
        info!(job_id = %job.id, "Created job {} ({})", job.name, job.job_type);

        self.enqueue(job).await
    }

    /// Submits a copy of an existing job under a new id
    pub async fn rerun_job(&self, id: Uuid, request: RerunJob) -> Result<Job, QueueError> {
        let original = self.get_job(id).await?;

        // Same environment means exactly the original bindings, even if unbound
        let (python_path, r_path) = if request.use_same_environment {
            (
                Some(original.python_env.map(|env| env.path).unwrap_or_default()),
                Some(original.r_env.map(|env| env.path).unwrap_or_default()),
            )
        } else {
            (request.python_path, request.r_path)
        };

        let job = self
            .create_job_with_parameters(CreateJob {
                job_type: original.job_type,
                name: format!("{} (Rerun)", original.name),
                command: original.command,
                args: original.args,
                parameters: original.parameters,
                python_path,
                r_path,
            })
            .await?;

        info!(job_id = %job.id, "Rerun of {}", id);
        Ok(job)
    }

    /// Puts an already-persisted Pending job back on the queue.
    ///
    /// The caller resets and saves the job first. Ids that are already
    /// admitted are left alone.
    pub async fn requeue_job(&self, job: Job) -> Result<(), QueueError> {
        self.admit(job).await.map(|_| ())
    }

    // ===== Queries =====

    pub async fn get_job(&self, id: Uuid) -> Result<Job, QueueError> {
        if let Some(job) = self.inner.state.read().await.cache.get(&id) {
            return Ok(job.clone());
        }

        self.inner
            .store
            .find_by_id(id)
            .await?
            .ok_or(QueueError::NotFound(id))
    }

    /// Most recent jobs, bounded by the configured listing limit
    pub async fn get_all_jobs(&self) -> Result<Vec<Job>, QueueError> {
        Ok(self.inner.store.find_all(self.inner.config.list_limit).await?)
    }

    /// Jobs in `status`, most recent first
    pub async fn get_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, QueueError> {
        let mut jobs = self.inner.store.find_by_status(status).await?;
        jobs.reverse();
        Ok(jobs)
    }

    pub async fn search_jobs(&self, query: &str) -> Result<Vec<Job>, QueueError> {
        Ok(self
            .inner
            .store
            .search(query, self.inner.config.list_limit)
            .await?)
    }

    pub async fn has_in_progress_jobs(&self) -> Result<bool, QueueError> {
        Ok(self.inner.store.count_by_status(JobStatus::InProgress).await? > 0)
    }

    /// Whether the id is queued, held or running in this process
    pub async fn is_tracked(&self, id: Uuid) -> bool {
        self.inner.state.read().await.admitted.contains(&id)
    }

    pub async fn get_queue_status(&self) -> Result<QueueStatus, QueueError> {
        let (control, mut in_flight) = {
            let state = self.inner.state.read().await;
            (
                state.control,
                state.in_flight.keys().copied().collect::<Vec<_>>(),
            )
        };
        in_flight.sort();

        let backlog = self.inner.sender.max_capacity() - self.inner.sender.capacity();

        Ok(QueueStatus {
            paused: control.is_paused(),
            stop_immediate: control.is_stop_immediate(),
            in_flight,
            pending_count: self.inner.store.count_by_status(JobStatus::Pending).await?,
            in_progress_count: self.inner.store.count_by_status(JobStatus::InProgress).await?,
            backlog,
        })
    }

    // ===== Mutations =====

    /// Removes a job regardless of its status; a running job is killed
    pub async fn delete_job(&self, id: Uuid) -> Result<(), QueueError> {
        let mut state = self.inner.state.write().await;

        let removed = self.inner.store.delete(id).await?;

        let running = match state.in_flight.get_mut(&id) {
            Some(flight) => {
                flight.deleted = true;
                flight.cancel.cancel();
                true
            }
            None => false,
        };
        let admitted = state.admitted.remove(&id);
        state.cache.remove(&id);
        drop(state);

        if !removed && !running && !admitted {
            return Err(QueueError::NotFound(id));
        }

        info!(job_id = %id, "Deleted job");
        Ok(())
    }

    /// Kills the process of one running job
    pub async fn cancel_job(&self, id: Uuid) -> Result<(), QueueError> {
        if let Some(flight) = self.inner.state.read().await.in_flight.get(&id) {
            flight.cancel.cancel();
            info!(job_id = %id, "Cancellation requested");
            return Ok(());
        }

        match self.inner.store.find_by_id(id).await? {
            Some(_) => Err(QueueError::NotRunning(id)),
            None => Err(QueueError::NotFound(id)),
        }
    }

    // ===== Control =====

    /// Running -> Paused
    pub async fn pause_queue(&self) -> Result<ControlState, QueueError> {
        let mut state = self.inner.state.write().await;
        let next = state.control.pause()?;
        self.inner.set_control(&mut state, next);
        drop(state);

        info!("Queue paused");
        self.inner.emit_control(next);
        Ok(next)
    }

    /// Any state -> PausedImmediateStop
    ///
    /// Every job a worker claims from now on fails without running. Jobs that
    /// are already running are only killed when the queue is configured to.
    pub async fn stop_queue_immediate(&self) -> Result<ControlState, QueueError> {
        let mut state = self.inner.state.write().await;
        let next = state.control.stop_immediate();
        self.inner.set_control(&mut state, next);

        if self.inner.config.stop_interrupts_running {
            for flight in state.in_flight.values() {
                flight.cancel.cancel();
            }
        }
        let running = state.in_flight.len();
        drop(state);

        info!("Queue stopped immediately ({} jobs running)", running);
        self.inner.emit_control(next);
        Ok(next)
    }

    /// Paused or PausedImmediateStop -> Running, then re-admits Pending jobs
    /// that the store knows about but the queue does not
    pub async fn resume_queue(&self) -> Result<ControlState, QueueError> {
        let mut state = self.inner.state.write().await;
        let next = state.control.resume()?;
        self.inner.set_control(&mut state, next);
        drop(state);

        info!("Queue resumed");
        self.inner.emit_control(next);

        // The backlog may be full; don't hold the caller while it drains
        let queue = self.clone();
        tokio::spawn(async move { queue.requeue_orphans().await });

        Ok(next)
    }

    /// Stops claiming new jobs and waits for the workers to finish their
    /// current job
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let handles: Vec<_> = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }

        info!("Job queue shut down");
    }

    // ===== Helper Functions =====

    async fn admit(&self, job: Job) -> Result<Job, QueueError> {
        if !self.reserve(job.id).await? {
            debug!(job_id = %job.id, "Job already queued");
            return Ok(job);
        }
        self.enqueue(job).await
    }

    /// Marks the id as admitted; `false` if it already was
    async fn reserve(&self, id: Uuid) -> Result<bool, QueueError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }
        Ok(self.inner.state.write().await.admitted.insert(id))
    }

    /// Publishes a reserved job and hands its id to the workers
    async fn enqueue(&self, job: Job) -> Result<Job, QueueError> {
        self.inner
            .state
            .write()
            .await
            .cache
            .insert(job.id, job.clone());
        self.inner.emit_update(&job);

        if self.inner.sender.send(job.id).await.is_err() {
            let mut state = self.inner.state.write().await;
            state.admitted.remove(&job.id);
            state.cache.remove(&job.id);
            return Err(QueueError::Closed);
        }

        debug!(job_id = %job.id, "Job queued");
        Ok(job)
    }

    async fn requeue_orphans(&self) {
        let pending = match self.inner.store.find_by_status(JobStatus::Pending).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to scan for pending jobs: {}", e);
                return;
            }
        };

        for id in pending.into_iter().map(|job| job.id) {
            match self.reserve(id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(job_id = %id, "Could not requeue pending job: {}", e);
                    return;
                }
            }

            // The scan is a snapshot; the job may have moved on since
            let job = match self.inner.store.find_by_id(id).await {
                Ok(Some(job)) if job.status == JobStatus::Pending => job,
                Ok(_) => {
                    debug!(job_id = %id, "Job no longer pending");
                    self.inner.release(id).await;
                    continue;
                }
                Err(e) => {
                    error!(job_id = %id, "Failed to reload pending job: {}", e);
                    self.inner.release(id).await;
                    continue;
                }
            };

            match self.enqueue(job).await {
                Ok(_) => info!(job_id = %id, "Requeued pending job"),
                Err(e) => warn!(job_id = %id, "Could not requeue pending job: {}", e),
            }
        }
    }
}

// ===== Worker =====

async fn worker_loop(inner: Arc<Inner>, worker: usize) {
    let mut control = inner.control.subscribe();
    debug!("Worker {} started", worker);

    loop {
        if !inner.wait_until_admitting(&mut control).await {
            break;
        }

        let id = {
            let mut receiver = inner.receiver.lock().await;

            // Paused while waiting for the receiver
            let admitting = control.borrow().admits_work();
            if !admitting {
                continue;
            }

            tokio::select! {
                id = receiver.recv() => id,
                _ = inner.shutdown.cancelled() => None,
            }
        };

        let Some(id) = id else {
            break;
        };

        // Paused after dequeuing: hold the job until resume
        if !inner.wait_until_admitting(&mut control).await {
            inner.release(id).await;
            break;
        }

        inner.process_job(id).await;
    }

    debug!("Worker {} stopped", worker);
}

impl Inner {
    /// Returns `false` on shutdown
    async fn wait_until_admitting(&self, control: &mut watch::Receiver<ControlState>) -> bool {
        loop {
            if self.shutdown.is_cancelled() {
                return false;
            }

            let admitting = control.borrow_and_update().admits_work();
            if admitting {
                return true;
            }

            tokio::select! {
                changed = control.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
                _ = self.shutdown.cancelled() => return false,
            }
        }
    }

    async fn process_job(&self, id: Uuid) {
        // The queue only carries ids; the store decides what to run
        let mut job = match self.store.find_by_id(id).await {
            Ok(Some(job)) if job.status == JobStatus::Pending => job,
            Ok(Some(job)) => {
                debug!(job_id = %id, "Skipping job in status {}", job.status);
                self.release(id).await;
                return;
            }
            Ok(None) => {
                debug!(job_id = %id, "Skipping deleted job");
                self.release(id).await;
                return;
            }
            Err(e) => {
                error!(job_id = %id, "Failed to load job: {}", e);
                self.release(id).await;
                return;
            }
        };

        let cancel = CancellationToken::new();
        let stop_immediate = {
            let mut state = self.state.write().await;

            // Deleted between the read above and now
            if !state.admitted.contains(&id) {
                drop(state);
                debug!(job_id = %id, "Skipping deleted job");
                self.release(id).await;
                return;
            }

            state.in_flight.insert(
                id,
                InFlight {
                    cancel: cancel.clone(),
                    deleted: false,
                },
            );
            state.control.is_stop_immediate()
        };

        if let Err(e) = job.start() {
            error!(job_id = %id, "Cannot start job: {}", e);
            self.release(id).await;
            return;
        }
        info!(job_id = %id, "Job started");
        if self.persist(&job).await {
            self.emit_update(&job);
        }

        if stop_immediate {
            self.fail_and_finish(job, STOPPED_BY_USER).await;
            return;
        }

        if let Err(e) = environment::validate_bindings(
            self.environments.as_ref(),
            job.python_env.as_ref(),
            job.r_env.as_ref(),
        )
        .await
        {
            self.fail_and_finish(job, e.to_string()).await;
            return;
        }

        let Some(invocation) = Invocation::from_args(&job.args) else {
            // Nothing to run
            if let Err(e) = job.complete() {
                error!(job_id = %id, "Cannot complete job: {}", e);
            }
            self.finish(job).await;
            return;
        };

        let kind = RunnerKind::for_command(&job.command);
        let Some(runner) = self.runners.get(kind) else {
            self.fail_and_finish(job, kind.missing_message()).await;
            return;
        };

        let invocation = match kind {
            RunnerKind::Python => {
                invocation.with_interpreter(job.python_env.as_ref().map(|env| env.path.clone()))
            }
            RunnerKind::R => {
                invocation.with_interpreter(job.r_env.as_ref().map(|env| env.path.clone()))
            }
            RunnerKind::Direct => invocation.with_working_dir(job.output_dir().map(PathBuf::from)),
        };

        debug!(job_id = %id, "Dispatching to {} runner", runner.name());

        let (output_tx, mut output_rx) = mpsc::channel::<String>(self.config.output_buffer.max(1));
        let run = runner.execute(invocation, output_tx, cancel.clone());
        let collect = async {
            while let Some(line) = output_rx.recv().await {
                job.append_output(line.clone());
                if self.persist(&job).await {
                    self.events.emit(QueueEvent::JobOutput {
                        job_id: id,
                        output: line,
                    });
                }
            }
        };
        let (result, ()) = tokio::join!(run, collect);

        let outcome = match result {
            Ok(()) => job.complete(),
            Err(RunnerError::Cancelled) => job.fail(CANCELLED_BY_USER),
            Err(e) => job.fail(e.to_string()),
        };
        if let Err(e) = outcome {
            error!(job_id = %id, "Cannot finish job: {}", e);
        }
        job.record_output_path();

        self.finish(job).await;
    }

    async fn fail_and_finish(&self, mut job: Job, error: impl Into<String>) {
        if let Err(e) = job.fail(error) {
            error!(job_id = %job.id, "Cannot fail job: {}", e);
        }
        self.finish(job).await;
    }

    /// Persists the terminal state and forgets the job in one step
    async fn finish(&self, job: Job) {
        let written = {
            let mut state = self.state.write().await;
            let written = self.write_job(&mut state, &job).await;
            state.in_flight.remove(&job.id);
            state.admitted.remove(&job.id);
            state.cache.remove(&job.id);
            written
        };

        if !written {
            debug!(job_id = %job.id, "Job was deleted while running");
            return;
        }

        match &job.error {
            Some(error) => info!(job_id = %job.id, "Job failed: {}", error),
            None => info!(job_id = %job.id, "Job {}", job.status),
        }
        self.emit_update(&job);
    }

    async fn persist(&self, job: &Job) -> bool {
        let mut state = self.state.write().await;
        self.write_job(&mut state, job).await
    }

    /// Saves the job and refreshes the cache.
    ///
    /// Store failures are logged and otherwise ignored. Returns `false` when
    /// the job was deleted and nothing was written.
    async fn write_job(&self, state: &mut QueueState, job: &Job) -> bool {
        if state.in_flight.get(&job.id).is_some_and(|flight| flight.deleted) {
            return false;
        }

        if let Err(e) = self.store.save(job).await {
            error!(job_id = %job.id, "Failed to persist job: {}", e);
        }
        state.cache.insert(job.id, job.clone());
        true
    }

    async fn release(&self, id: Uuid) {
        let mut state = self.state.write().await;
        state.in_flight.remove(&id);
        state.admitted.remove(&id);
        state.cache.remove(&id);
    }

    fn set_control(&self, state: &mut QueueState, next: ControlState) {
        state.control = next;
        self.control.send_replace(next);
    }

    fn emit_control(&self, control: ControlState) {
        self.events.emit(QueueEvent::QueueStatus {
            paused: control.is_paused(),
            stop_immediate: control.is_stop_immediate(),
        });
    }

    fn emit_update(&self, job: &Job) {
        self.events.emit(QueueEvent::JobUpdate(Box::new(job.clone())));
    }
}
