//! Orchestrator
//!
//! Drives every job from `PENDING` to a terminal status:
//!
//! ```text
//! PENDING --fork--> FORKING --dispatch--> DISPATCHED --> POLLING --> SUCCEEDED
//!    |                 |  ^                                 |  ^  --> FAILED
//!    |                 +--+ NotReady / transient            +--+  --> TIMED_OUT
//!    +--> FAILED          backoff                           poll interval
//! ```
//!
//! Each job runs in its own tokio task. The task holds one of
//! `max_concurrent_jobs` semaphore permits for the whole job; submissions
//! beyond that wait for a permit (optionally bounded by a queue-depth limit).
//!
//! Every status change is a compare-and-swap through the registry. The task
//! re-reads the record before each step, so a webhook or a cancellation that
//! landed during a wait is observed at the next checkpoint. The caller that
//! wins the CAS into a terminal status hands the record to the notifier, which
//! makes callback delivery happen exactly once per job.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use relay_core::domain::job::{
    FailureReason, JobId, JobRecord, JobResult, JobStatus, PullRequestRef,
};
use relay_core::dto::job::SubmitJob;
use relay_core::dto::webhook::{WebhookStatus, WorkflowWebhook};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::notifier::CallbackNotifier;
use super::policy::OrchestratorPolicies;
use super::validation::{ValidationError, validate_submission};
use crate::gateway::{
    self, DispatchRequest, GatewayError, RemoteGateway, RunOutcome, RunStatus,
};
use crate::repository::{JobFilter, JobRegistry, RegistryError};

/// Attempts at resolving a CAS conflict before giving up on an external update
const MAX_CAS_RETRIES: usize = 8;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Jobs orchestrated at the same time
    pub max_concurrent_jobs: usize,
    /// Jobs allowed to wait for a slot; `None` queues without bound
    pub queue_depth_limit: Option<usize>,
    /// Fork owner for submissions that do not name one
    pub default_owner: String,
    pub policies: OrchestratorPolicies,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            queue_depth_limit: None,
            default_owner: "relay-bot".to_string(),
            policies: OrchestratorPolicies::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Idempotency key already used by in-flight job {existing}")]
    Duplicate { existing: JobId },

    #[error("Orchestrator is overloaded, try again later")]
    Overloaded,

    #[error("Registry failure: {0}")]
    Registry(RegistryError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WebhookError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} has not been dispatched")]
    NotDispatched(JobId),

    #[error("Registry failure: {0}")]
    Registry(RegistryError),
}

/// How a job got admitted
enum Admission {
    /// A slot was free at submission
    Running(OwnedSemaphorePermit),
    /// The job waits for a slot and counts against the queue depth
    Queued,
}

/// Which retry budget a failed provider call draws from
#[derive(Debug, Clone, Copy)]
enum RetryClass {
    NotReady,
    Transient,
}

/// Per-task retry and polling state; not persisted
///
/// Retry counters belong to the status they were counted in and restart when
/// the job moves on.
#[derive(Default)]
struct TaskState {
    step: Option<JobStatus>,
    not_ready: u32,
    transient: u32,
    deadline: Option<Instant>,
    missing: u32,
}

impl TaskState {
    fn enter(&mut self, status: JobStatus) {
        if self.step != Some(status) {
            self.step = Some(status);
            self.not_ready = 0;
            self.transient = 0;
            self.missing = 0;
        }
    }

    /// Count one more failure of `class`, returning that class's total
    fn bump(&mut self, class: RetryClass) -> u32 {
        let counter = match class {
            RetryClass::NotReady => &mut self.not_ready,
            RetryClass::Transient => &mut self.transient,
        };
        *counter += 1;
        *counter
    }

    fn attempts(&self) -> u32 {
        self.not_ready + self.transient
    }
}

struct Inner {
    registry: Arc<JobRegistry>,
    gateway: Arc<dyn RemoteGateway>,
    notifier: Arc<dyn CallbackNotifier>,
    config: OrchestratorConfig,
    slots: Arc<Semaphore>,
    waiting: AtomicUsize,
    active: Mutex<HashSet<JobId>>,
}

/// Job orchestrator
///
/// Cheap to clone; all clones share the same registry and admission state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        gateway: Arc<dyn RemoteGateway>,
        notifier: Arc<dyn CallbackNotifier>,
        config: OrchestratorConfig,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            inner: Arc::new(Inner {
                registry,
                gateway,
                notifier,
                config,
                slots,
                waiting: AtomicUsize::new(0),
                active: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    fn policies(&self) -> &OrchestratorPolicies {
        &self.inner.config.policies
    }

    // =========================================================================
    // Façade operations
    // =========================================================================

    /// Validate and register a job, then start orchestrating it
    ///
    /// The returned record is the freshly created `PENDING` job.
    pub async fn submit(&self, req: SubmitJob) -> Result<JobRecord, SubmitError> {
        let job = validate_submission(req, &self.inner.config.default_owner)?;
        if let Some(key) = job.idempotency_key.as_deref() {
            if let Some(existing) = self.inner.registry.live_job_for_key(key).await {
                return Err(SubmitError::Duplicate { existing });
            }
        }
        let admission = self.admit()?;

        let record = match self.inner.registry.create(job).await {
            Ok(record) => record,
            Err(e) => {
                self.release(admission);
                return Err(match e {
                    RegistryError::DuplicateSubmission { existing } => {
                        SubmitError::Duplicate { existing }
                    }
                    other => SubmitError::Registry(other),
                });
            }
        };

        info!(
            "Job {} submitted for {} (fork owner {})",
            record.id, record.source_repo, record.target_owner
        );
        self.spawn_job(record.id, admission).await;

        Ok(record)
    }

    pub async fn get(&self, id: JobId) -> Result<JobRecord, RegistryError> {
        self.inner.registry.get(id).await
    }

    pub async fn list(&self, filter: JobFilter) -> Vec<JobRecord> {
        self.inner.registry.list(filter).await
    }

    /// Flag a job for cancellation
    ///
    /// Best effort: the job moves to `FAILED(cancelled)` at its next
    /// checkpoint. Terminal jobs are returned unchanged.
    pub async fn cancel(&self, id: JobId) -> Result<JobRecord, RegistryError> {
        for _ in 0..MAX_CAS_RETRIES {
            let record = self.inner.registry.get(id).await?;
            if record.status.is_terminal() || record.cancel_requested {
                return Ok(record);
            }

            match self
                .inner
                .registry
                .update(id, record.status, |job| job.cancel_requested = true)
                .await
            {
                Ok(updated) => {
                    info!("Cancellation requested for job {}", id);
                    return Ok(updated);
                }
                Err(RegistryError::StatusConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        self.inner.registry.get(id).await
    }

    /// Resolve a job from a workflow completion report
    ///
    /// Uses the same terminal CAS as polling, so whichever of the two lands
    /// first decides the outcome and triggers the callback.
    pub async fn apply_webhook(&self, event: WorkflowWebhook) -> Result<JobRecord, WebhookError> {
        let id = event.job_id;
        // Looked up at most once, CAS retries reuse it
        let mut looked_up: Option<Option<PullRequestRef>> = None;

        for _ in 0..MAX_CAS_RETRIES {
            let record = self.inner.registry.get(id).await.map_err(|e| match e {
                RegistryError::NotFound(id) => WebhookError::NotFound(id),
                other => WebhookError::Registry(other),
            })?;

            if record.status.is_terminal() {
                debug!("Ignoring webhook for finished job {}", id);
                return Ok(record);
            }
            let Some(run_id) = record.workflow_run_id else {
                return Err(WebhookError::NotDispatched(id));
            };
            if let Some(reported) = event.run_id {
                if reported != run_id {
                    warn!(
                        "Webhook for job {} reports run {} but the job tracks run {}",
                        id, reported, run_id
                    );
                }
            }

            let (status, result) = match event.status {
                WebhookStatus::Running => return Ok(record),
                WebhookStatus::Completed => {
                    let pull_request = match event.pr_url.as_deref() {
                        Some(url) => PullRequestRef::from_url(url),
                        None => {
                            if looked_up.is_none() {
                                looked_up = Some(self.lookup_pull_request(&record).await);
                            }
                            looked_up.clone().flatten()
                        }
                    };
                    (JobStatus::Succeeded, JobResult::succeeded(pull_request))
                }
                WebhookStatus::Failed => {
                    let detail = event
                        .error
                        .clone()
                        .unwrap_or_else(|| "workflow reported failure".to_string());
                    (
                        JobStatus::Failed,
                        JobResult::failed(FailureReason::WorkflowFailed, detail),
                    )
                }
            };

            match self.finish(&record, status, result).await {
                Ok(updated) => {
                    info!("Job {} resolved by webhook", id);
                    return Ok(updated);
                }
                Err(RegistryError::StatusConflict { .. }) => continue,
                Err(e) => return Err(WebhookError::Registry(e)),
            }
        }

        self.inner
            .registry
            .get(id)
            .await
            .map_err(WebhookError::Registry)
    }

    /// Restart orchestration for jobs loaded from persistence
    ///
    /// `PENDING`, `DISPATCHED` and `POLLING` jobs resume. A `FORKING` job may
    /// already have a run that was never recorded, so it fails as interrupted
    /// instead of risking a second dispatch. Returns the number of resumed jobs.
    pub async fn resume_restored(&self) -> usize {
        let mut resumed = 0;

        for record in self.inner.registry.list(JobFilter::default()).await {
            match record.status {
                JobStatus::Pending | JobStatus::Dispatched | JobStatus::Polling => {
                    info!("Resuming job {} in {}", record.id, record.status);
                    self.inner.waiting.fetch_add(1, Ordering::SeqCst);
                    if self.spawn_job(record.id, Admission::Queued).await {
                        resumed += 1;
                    }
                }
                JobStatus::Forking => {
                    let result = JobResult::failed(
                        FailureReason::Interrupted,
                        "orchestrator restarted while dispatching",
                    );
                    if let Err(e) = self.finish(&record, JobStatus::Failed, result).await {
                        error!("Failed to close interrupted job {}: {}", record.id, e);
                    }
                }
                _ => {}
            }
        }

        resumed
    }

    /// Drop terminal jobs older than `retention`
    pub async fn evict_expired(&self, retention: Duration) -> Vec<JobId> {
        let evicted = self.inner.registry.evict_expired(retention).await;
        if !evicted.is_empty() {
            info!("Evicted {} expired jobs", evicted.len());
        }
        evicted
    }

    /// Jobs currently holding an orchestration slot
    pub fn active_jobs(&self) -> usize {
        self.inner.config.max_concurrent_jobs.max(1) - self.inner.slots.available_permits()
    }

    /// Jobs waiting for an orchestration slot
    pub fn queued_jobs(&self) -> usize {
        self.inner.waiting.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Admission and task lifecycle
    // =========================================================================

    fn admit(&self) -> Result<Admission, SubmitError> {
        if let Ok(permit) = self.inner.slots.clone().try_acquire_owned() {
            return Ok(Admission::Running(permit));
        }

        let limit = self.inner.config.queue_depth_limit;
        self.inner
            .waiting
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |queued| match limit {
                Some(limit) if queued >= limit => None,
                _ => Some(queued + 1),
            })
            .map(|_| Admission::Queued)
            .map_err(|_| SubmitError::Overloaded)
    }

    fn release(&self, admission: Admission) {
        if let Admission::Queued = admission {
            self.inner.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Spawn the task for a job unless one is already running
    async fn spawn_job(&self, id: JobId, admission: Admission) -> bool {
        if !self.inner.active.lock().await.insert(id) {
            debug!("Job {} already has a running task", id);
            self.release(admission);
            return false;
        }

        let this = self.clone();
        tokio::spawn(async move {
            let permit = match admission {
                Admission::Running(permit) => Ok(permit),
                Admission::Queued => {
                    let permit = this.inner.slots.clone().acquire_owned().await;
                    this.inner.waiting.fetch_sub(1, Ordering::SeqCst);
                    permit
                }
            };

            match permit {
                Ok(_permit) => {
                    let driver = tokio::spawn({
                        let this = this.clone();
                        async move { this.drive(id).await }
                    });
                    if let Err(e) = driver.await {
                        error!("Job {} task crashed: {}", id, e);
                        this.force_fail(id, "orchestration task crashed").await;
                    }
                }
                Err(_) => error!("Job {} could not get a slot, orchestrator closed", id),
            }

            this.inner.active.lock().await.remove(&id);
        });

        true
    }

    // =========================================================================
    // State machine
    // =========================================================================

    async fn drive(&self, id: JobId) {
        let mut task = TaskState::default();

        loop {
            let record = match self.inner.registry.get(id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!("Job {} disappeared from the registry: {}", id, e);
                    return;
                }
            };

            if record.status.is_terminal() {
                debug!("Job {} is {}, task done", id, record.status);
                return;
            }

            task.enter(record.status);
            let step = if record.cancel_requested {
                let result = JobResult::failed(FailureReason::Cancelled, "cancelled by request");
                self.finish(&record, JobStatus::Failed, result)
                    .await
                    .map(|_| ())
            } else {
                match record.status {
                    JobStatus::Pending => self.fork_step(&record, &mut task).await,
                    JobStatus::Forking => self.dispatch_step(&record, &mut task).await,
                    JobStatus::Dispatched => self.start_polling(&record, &mut task).await,
                    JobStatus::Polling => self.poll_step(&record, &mut task).await,
                    _ => return,
                }
            };

            match step {
                Ok(()) => {}
                Err(RegistryError::StatusConflict { actual, .. }) => {
                    debug!("Job {} moved to {} concurrently", id, actual);
                }
                Err(RegistryError::NotFound(_)) => return,
                Err(e) => {
                    error!("Job {} hit a local fault: {}", id, e);
                    self.force_fail(id, &e.to_string()).await;
                }
            }
        }
    }

    async fn fork_step(
        &self,
        record: &JobRecord,
        task: &mut TaskState,
    ) -> Result<(), RegistryError> {
        let call = self
            .inner
            .gateway
            .fork(&record.source_repo, &record.target_owner);
        let fork = match bounded(self.policies().call_timeout, "fork", call).await {
            Ok(fork) => fork,
            Err(GatewayError::ForkConflict { fork }) => {
                info!("Job {} reusing existing fork {}", record.id, fork.repo);
                fork
            }
            Err(e @ (GatewayError::RemoteUnavailable(_) | GatewayError::NotReady(_))) => {
                return self
                    .retry_or_fail(
                        record,
                        task,
                        RetryClass::Transient,
                        &e,
                        FailureReason::ForkFailed,
                    )
                    .await;
            }
            Err(e) => return self.fail(record, FailureReason::ForkFailed, e.to_string()).await,
        };

        self.inner
            .registry
            .update(record.id, JobStatus::Pending, |job| {
                job.status = JobStatus::Forking;
                job.fork = Some(fork.clone());
                job.attempt_count = 0;
            })
            .await?;

        info!("Job {} forked into {}, dispatching", record.id, fork.repo);
        Ok(())
    }

    async fn dispatch_step(
        &self,
        record: &JobRecord,
        task: &mut TaskState,
    ) -> Result<(), RegistryError> {
        let Some(fork) = record.fork.clone() else {
            return self
                .fail(record, FailureReason::InternalError, "job has no fork")
                .await;
        };

        let request = DispatchRequest {
            job_id: record.id,
            source_repo: record.source_repo.clone(),
            task_input: record.task_input.clone(),
        };

        let call = self.inner.gateway.dispatch_workflow(&fork, &request);
        match bounded(self.policies().call_timeout, "dispatch", call).await {
            Ok(run_id) => {
                self.inner
                    .registry
                    .update(record.id, JobStatus::Forking, |job| {
                        job.status = JobStatus::Dispatched;
                        job.workflow_run_id = Some(run_id);
                        job.attempt_count = 0;
                    })
                    .await?;
                info!("Job {} dispatched as workflow run {}", record.id, run_id);
                Ok(())
            }
            Err(e @ GatewayError::NotReady(_)) => {
                self.retry_or_fail(
                    record,
                    task,
                    RetryClass::NotReady,
                    &e,
                    FailureReason::DispatchRetriesExhausted,
                )
                .await
            }
            Err(e @ GatewayError::RemoteUnavailable(_)) => {
                self.retry_or_fail(
                    record,
                    task,
                    RetryClass::Transient,
                    &e,
                    FailureReason::DispatchRetriesExhausted,
                )
                .await
            }
            Err(e) => {
                self.fail(record, FailureReason::DispatchRejected, e.to_string())
                    .await
            }
        }
    }

    async fn start_polling(
        &self,
        record: &JobRecord,
        task: &mut TaskState,
    ) -> Result<(), RegistryError> {
        self.inner
            .registry
            .update(record.id, JobStatus::Dispatched, |job| {
                job.status = JobStatus::Polling;
                job.attempt_count = 0;
            })
            .await?;

        task.deadline = Some(Instant::now() + self.policies().poll.timeout);
        info!("Job {} polling workflow run", record.id);
        Ok(())
    }

    async fn poll_step(&self, record: &JobRecord, task: &mut TaskState) -> Result<(), RegistryError> {
        let timeout = self.policies().poll.timeout;
        let deadline = *task.deadline.get_or_insert_with(|| Instant::now() + timeout);

        let Some(run_id) = record.workflow_run_id else {
            return self
                .fail(record, FailureReason::InternalError, "polling job has no run id")
                .await;
        };

        if Instant::now() >= deadline {
            warn!("Job {} exceeded the {:?} ceiling", record.id, timeout);
            let result = JobResult::timed_out(format!(
                "workflow run {} did not complete within {}s",
                run_id,
                timeout.as_secs()
            ));
            return self
                .finish(record, JobStatus::TimedOut, result)
                .await
                .map(|_| ());
        }

        // A stalled call must not outlive the ceiling
        let limit = self
            .policies()
            .call_timeout
            .min(deadline.saturating_duration_since(Instant::now()));
        match bounded(limit, "poll", self.inner.gateway.poll_status(run_id)).await {
            Ok(RunStatus::Running) => {
                task.missing = 0;
                self.wait_for_next_poll(record, deadline).await
            }
            Ok(RunStatus::Completed(outcome)) => self.complete(record, outcome).await,
            Ok(RunStatus::NotFound) => {
                task.missing += 1;
                if task.missing > self.policies().poll.max_missing {
                    return self
                        .fail(
                            record,
                            FailureReason::WorkflowNotFound,
                            format!("workflow run {} not found", run_id),
                        )
                        .await;
                }
                debug!("Job {} run {} not visible yet", record.id, run_id);
                self.wait_for_next_poll(record, deadline).await
            }
            Err(e @ (GatewayError::RemoteUnavailable(_) | GatewayError::NotReady(_))) => {
                warn!("Job {} poll failed: {}", record.id, e);
                self.wait_for_next_poll(record, deadline).await
            }
            Err(e) => {
                self.fail(record, FailureReason::RemoteRejected, e.to_string())
                    .await
            }
        }
    }

    async fn wait_for_next_poll(
        &self,
        record: &JobRecord,
        deadline: Instant,
    ) -> Result<(), RegistryError> {
        let attempt = record.attempt_count + 1;
        self.inner
            .registry
            .update(record.id, JobStatus::Polling, |job| job.attempt_count = attempt)
            .await?;

        let interval = self.policies().poll.interval_for(attempt);
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(interval.min(remaining)).await;
        Ok(())
    }

    async fn complete(&self, record: &JobRecord, outcome: RunOutcome) -> Result<(), RegistryError> {
        let (status, result) = if outcome.success {
            let pull_request = match outcome.pull_request {
                Some(pr) => Some(pr),
                None => self.lookup_pull_request(record).await,
            };
            (JobStatus::Succeeded, JobResult::succeeded(pull_request))
        } else {
            let detail = format!(
                "workflow concluded {}",
                outcome.conclusion.as_deref().unwrap_or("without a conclusion")
            );
            (
                JobStatus::Failed,
                JobResult::failed(FailureReason::WorkflowFailed, detail),
            )
        };

        self.finish(record, status, result.with_run_url(outcome.run_url))
            .await
            .map(|_| ())
    }

    /// A lookup failure leaves the job without a PR reference
    async fn lookup_pull_request(&self, record: &JobRecord) -> Option<PullRequestRef> {
        let fork = record.fork.as_ref()?;
        let call = self
            .inner
            .gateway
            .find_pull_request(&record.source_repo, fork, record.id);
        match bounded(self.policies().call_timeout, "pull request lookup", call).await {
            Ok(pr) => pr,
            Err(e) => {
                warn!("Job {} pull request lookup failed: {}", record.id, e);
                None
            }
        }
    }

    /// Count a failed attempt and wait, or fail the job once the policy gives up
    ///
    /// Each class is judged against its own policy and counter; the record's
    /// `attempt_count` shows the failures of both classes in this status.
    async fn retry_or_fail(
        &self,
        record: &JobRecord,
        task: &mut TaskState,
        class: RetryClass,
        error: &GatewayError,
        exhausted: FailureReason,
    ) -> Result<(), RegistryError> {
        let policy = match class {
            RetryClass::NotReady => &self.policies().not_ready,
            RetryClass::Transient => &self.policies().transient,
        };
        let attempt = task.bump(class);

        let Some(delay) = policy.next_delay(attempt) else {
            let detail = format!("{} (gave up after {} attempts)", error, attempt);
            return self.fail(record, exhausted, detail).await;
        };

        let total = task.attempts();
        self.inner
            .registry
            .update(record.id, record.status, |job| job.attempt_count = total)
            .await?;

        warn!(
            "Job {} {} (attempt {}), retrying in {:?}",
            record.id, error, attempt, delay
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn fail(
        &self,
        record: &JobRecord,
        reason: FailureReason,
        detail: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.finish(record, JobStatus::Failed, JobResult::failed(reason, detail))
            .await
            .map(|_| ())
    }

    /// CAS `record` into a terminal status
    ///
    /// Only a successful transition starts callback delivery.
    async fn finish(
        &self,
        record: &JobRecord,
        status: JobStatus,
        result: JobResult,
    ) -> Result<JobRecord, RegistryError> {
        let updated = self
            .inner
            .registry
            .update(record.id, record.status, |job| {
                job.status = status;
                job.result = Some(result);
                job.attempt_count = 0;
            })
            .await?;

        match updated.result.as_ref().and_then(|r| r.reason) {
            Some(reason) => info!("Job {} finished {} ({})", updated.id, status, reason.as_str()),
            None => info!("Job {} finished {}", updated.id, status),
        }

        self.spawn_callback(updated.clone());
        Ok(updated)
    }

    /// Fail a job after a local fault, whatever step it was in
    async fn force_fail(&self, id: JobId, detail: &str) {
        for _ in 0..MAX_CAS_RETRIES {
            let record = match self.inner.registry.get(id).await {
                Ok(record) => record,
                Err(_) => return,
            };
            if record.status.is_terminal() {
                return;
            }

            let result = JobResult::failed(FailureReason::InternalError, detail);
            match self.finish(&record, JobStatus::Failed, result).await {
                Ok(_) => return,
                Err(RegistryError::StatusConflict { .. }) => continue,
                Err(e) => {
                    error!("Could not fail job {} after local fault: {}", id, e);
                    return;
                }
            }
        }
    }

    fn spawn_callback(&self, record: JobRecord) {
        let this = self.clone();
        tokio::spawn(async move {
            let state = this.inner.notifier.notify(&record).await;
            if state == record.callback {
                return;
            }

            let recorded = this
                .inner
                .registry
                .update(record.id, record.status, |job| job.callback = state)
                .await;
            if let Err(e) = recorded {
                debug!("Could not record callback state of job {}: {}", record.id, e);
            }
        });
    }
}

/// Run a provider call under `limit`; an elapsed call counts as the provider
/// being unavailable
async fn bounded<T>(
    limit: Duration,
    operation: &str,
    call: impl Future<Output = gateway::Result<T>>,
) -> gateway::Result<T> {
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(GatewayError::RemoteUnavailable(format!(
            "{} call timed out after {:?}",
            operation, limit
        )))
    })
}
