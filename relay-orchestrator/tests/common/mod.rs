//! Shared fixtures for orchestrator scenario tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relay_core::domain::job::{CallbackState, JobId, JobRecord, JobStatus, PullRequestRef, WorkflowRunId};
use relay_core::domain::repo::{ForkHandle, RepoPath};
use relay_core::dto::job::SubmitJob;
use relay_orchestrator::gateway::{
    DispatchRequest, GatewayError, RemoteGateway, Result, RunOutcome, RunStatus,
};
use relay_orchestrator::repository::{JobRegistry, JobStore, StoreError};
use relay_orchestrator::service::{
    CallbackNotifier, Orchestrator, OrchestratorConfig, OrchestratorPolicies, PollPolicy,
    RetryPolicy,
};
use tokio::time::Instant;

/// A gateway call as seen by the fake
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fork(RepoPath),
    Dispatch(JobId),
    Poll(WorkflowRunId),
    FindPullRequest(JobId),
}

/// What `poll_status` answers once its script is used up
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollFallback {
    Succeed,
    KeepRunning,
    Panic,
    /// Never answers
    Hang,
}

/// Scripted remote gateway
///
/// Each operation pops its next scripted response; an empty script falls back
/// to a well-behaved default (fork and dispatch succeed, polls follow
/// `PollFallback`).
pub struct FakeGateway {
    forks: Mutex<VecDeque<Result<ForkHandle>>>,
    dispatches: Mutex<VecDeque<Result<WorkflowRunId>>>,
    polls: Mutex<VecDeque<Result<RunStatus>>>,
    poll_fallback: Mutex<PollFallback>,
    pull_request: Mutex<Option<PullRequestRef>>,
    calls: Mutex<Vec<(Instant, Call)>>,
    delay: Duration,
    next_run: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            forks: Mutex::new(VecDeque::new()),
            dispatches: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            poll_fallback: Mutex::new(PollFallback::Succeed),
            pull_request: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            next_run: AtomicU64::new(1000),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every call takes `delay` of (virtual) time
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script_forks(self, responses: Vec<Result<ForkHandle>>) -> Self {
        self.forks.lock().unwrap().extend(responses);
        self
    }

    pub fn script_dispatches(self, responses: Vec<Result<WorkflowRunId>>) -> Self {
        self.dispatches.lock().unwrap().extend(responses);
        self
    }

    pub fn script_polls(self, responses: Vec<Result<RunStatus>>) -> Self {
        self.polls.lock().unwrap().extend(responses);
        self
    }

    pub fn poll_fallback(self, fallback: PollFallback) -> Self {
        *self.poll_fallback.lock().unwrap() = fallback;
        self
    }

    pub fn with_pull_request(self, pr: PullRequestRef) -> Self {
        *self.pull_request.lock().unwrap() = Some(pr);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn dispatch_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Dispatch(_)))
            .count()
    }

    pub fn poll_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Poll(_)))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) -> InFlight<'_> {
        self.calls.lock().unwrap().push((Instant::now(), call));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        guard
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn fork(&self, source: &RepoPath, target_owner: &str) -> Result<ForkHandle> {
        let _guard = self.enter(Call::Fork(source.clone())).await;
        match self.forks.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(ForkHandle::expected(source, target_owner).unwrap()),
        }
    }

    async fn dispatch_workflow(
        &self,
        _fork: &ForkHandle,
        request: &DispatchRequest,
    ) -> Result<WorkflowRunId> {
        let _guard = self.enter(Call::Dispatch(request.job_id)).await;
        match self.dispatches.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(WorkflowRunId(self.next_run.fetch_add(1, Ordering::SeqCst))),
        }
    }

    async fn poll_status(&self, run_id: WorkflowRunId) -> Result<RunStatus> {
        let _guard = self.enter(Call::Poll(run_id)).await;
        let scripted = self.polls.lock().unwrap().pop_front();
        if let Some(response) = scripted {
            return response;
        }

        let fallback = *self.poll_fallback.lock().unwrap();
        match fallback {
            PollFallback::Succeed => Ok(RunStatus::Completed(success(None))),
            PollFallback::KeepRunning => Ok(RunStatus::Running),
            PollFallback::Panic => panic!("poll_status exploded"),
            PollFallback::Hang => std::future::pending().await,
        }
    }

    async fn find_pull_request(
        &self,
        _source: &RepoPath,
        _fork: &ForkHandle,
        job_id: JobId,
    ) -> Result<Option<PullRequestRef>> {
        let _guard = self.enter(Call::FindPullRequest(job_id)).await;
        Ok(self.pull_request.lock().unwrap().clone())
    }
}

pub fn success(pull_request: Option<PullRequestRef>) -> RunOutcome {
    RunOutcome {
        success: true,
        conclusion: Some("success".to_string()),
        pull_request,
        run_url: Some("https://github.com/relay/agent-runner/actions/runs/1".to_string()),
    }
}

pub fn failure(conclusion: &str) -> RunOutcome {
    RunOutcome {
        success: false,
        conclusion: Some(conclusion.to_string()),
        pull_request: None,
        run_url: None,
    }
}

pub fn not_ready() -> GatewayError {
    GatewayError::NotReady("fork has no branches yet".to_string())
}

pub fn pr(repo: &str, number: u64) -> PullRequestRef {
    PullRequestRef {
        repo: RepoPath::parse(repo).unwrap(),
        number,
        url: None,
    }
}

/// Notifier that records every hand-off and answers with a fixed state
pub struct RecordingNotifier {
    outcome: CallbackState,
    seen: Mutex<Vec<(JobId, JobStatus)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::answering(CallbackState::Delivered { attempts: 1 })
    }

    pub fn answering(outcome: CallbackState) -> Self {
        Self {
            outcome,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, id: JobId) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(seen, _)| *seen == id)
            .count()
    }

    pub fn total(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn statuses(&self) -> HashMap<JobId, JobStatus> {
        self.seen.lock().unwrap().iter().copied().collect()
    }
}

#[async_trait]
impl CallbackNotifier for RecordingNotifier {
    async fn notify(&self, record: &JobRecord) -> CallbackState {
        self.seen.lock().unwrap().push((record.id, record.status));
        if record.callback_url.is_some() {
            self.outcome.clone()
        } else {
            CallbackState::NotRequested
        }
    }
}

/// In-memory store that takes `delay` to save the records `slow` selects
pub struct SlowStore {
    delay: Duration,
    slow: fn(&JobRecord) -> bool,
    records: Mutex<HashMap<JobId, JobRecord>>,
}

impl SlowStore {
    pub fn new(delay: Duration, slow: fn(&JobRecord) -> bool) -> Arc<Self> {
        Arc::new(Self {
            delay,
            slow,
            records: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl JobStore for SlowStore {
    async fn save(&self, record: &JobRecord) -> std::result::Result<(), StoreError> {
        if (self.slow)(record) {
            tokio::time::sleep(self.delay).await;
        }
        self.records.lock().unwrap().insert(record.id, record.clone());
        Ok(())
    }

    async fn remove(&self, id: JobId) -> std::result::Result<(), StoreError> {
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn load_all(&self) -> std::result::Result<Vec<JobRecord>, StoreError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

/// Deterministic policies: no jitter, second-scale waits
pub fn policies() -> OrchestratorPolicies {
    OrchestratorPolicies {
        not_ready: RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(8))
            .without_jitter(),
        transient: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4))
            .without_jitter(),
        poll: PollPolicy::new(
            Duration::from_secs(10),
            Duration::from_secs(10),
            Duration::from_secs(300),
        ),
        callback: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4))
            .without_jitter(),
        call_timeout: Duration::from_secs(30),
    }
}

pub fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_concurrent_jobs: 4,
        queue_depth_limit: None,
        default_owner: "relay-bot".to_string(),
        policies: policies(),
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(gateway: FakeGateway) -> Self {
        Self::build(gateway, RecordingNotifier::new(), config(), Arc::new(JobRegistry::default()))
    }

    pub fn build(
        gateway: FakeGateway,
        notifier: RecordingNotifier,
        config: OrchestratorConfig,
        registry: Arc<JobRegistry>,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let notifier = Arc::new(notifier);
        let orchestrator =
            Orchestrator::new(registry, gateway.clone(), notifier.clone(), config);
        Self {
            orchestrator,
            gateway,
            notifier,
        }
    }

    /// Polls the registry until the job is terminal
    pub async fn wait_for_terminal(&self, id: JobId) -> JobRecord {
        let wait = async {
            loop {
                let record = self.orchestrator.get(id).await.unwrap();
                if record.status.is_terminal() {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(24 * 3600), wait)
            .await
            .expect("job never reached a terminal status")
    }

    pub async fn wait_for_status(&self, id: JobId, status: JobStatus) -> JobRecord {
        let wait = async {
            loop {
                let record = self.orchestrator.get(id).await.unwrap();
                if record.status == status {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(24 * 3600), wait)
            .await
            .expect("job never reached the expected status")
    }

    /// Waits until the callback outcome has been written back to the record
    pub async fn wait_for_callback(&self, id: JobId) -> JobRecord {
        let wait = async {
            loop {
                let record = self.orchestrator.get(id).await.unwrap();
                if record.status.is_terminal() && record.callback != CallbackState::Pending {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(24 * 3600), wait)
            .await
            .expect("callback state never recorded")
    }
}

pub fn submission(repo: &str, task: &str) -> SubmitJob {
    SubmitJob {
        source_repo: repo.to_string(),
        target_owner: None,
        task_input: task.to_string(),
        callback_url: None,
        idempotency_key: None,
    }
}
