//! End-to-end orchestration scenarios against a scripted gateway
//!
//! All tests run on a paused tokio clock, so backoff and poll waits cost no
//! real time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use relay_core::domain::job::{
    CallbackState, FailureReason, JobRecord, JobResult, JobStatus, NewJob, WorkflowRunId,
};
use relay_core::domain::repo::{ForkHandle, RepoPath};
use relay_core::dto::webhook::{WebhookStatus, WorkflowWebhook};
use relay_orchestrator::gateway::{GatewayError, RunStatus};
use relay_orchestrator::repository::{JobRegistry, JobStore};
use relay_orchestrator::service::{OrchestratorConfig, SubmitError, WebhookError};

fn reason(record: &JobRecord) -> Option<FailureReason> {
    record.result.as_ref().and_then(|result| result.reason)
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_twice_then_success_with_pull_request() {
    let gateway = FakeGateway::new()
        .script_dispatches(vec![
            Err(not_ready()),
            Err(not_ready()),
            Ok(WorkflowRunId(42)),
        ])
        .script_polls(vec![
            Ok(RunStatus::Running),
            Ok(RunStatus::Completed(success(Some(pr("org/repo", 42))))),
        ]);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(
        harness.orchestrator.get(job.id).await.unwrap().status,
        JobStatus::Pending
    );

    let done = harness.wait_for_terminal(job.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.workflow_run_id, Some(WorkflowRunId(42)));

    let result = done.result.unwrap();
    assert!(result.success);
    assert_eq!(result.pull_request.unwrap().to_string(), "org/repo#42");

    assert_eq!(harness.gateway.dispatch_calls(), 3);
    assert_eq!(harness.gateway.poll_calls(), 2);
    assert_eq!(
        harness.gateway.calls().first(),
        Some(&Call::Fork(RepoPath::parse("org/repo").unwrap()))
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.notifier.count(job.id), 1);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_exhaustion_fails_job() {
    let gateway = FakeGateway::new().script_dispatches((0..20).map(|_| Err(not_ready())).collect());
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::DispatchRetriesExhausted));
    assert_eq!(done.workflow_run_id, None);
    // not_ready policy allows five attempts in total
    assert_eq!(harness.gateway.dispatch_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_dispatch_rejection() {
    let gateway = FakeGateway::new().script_dispatches(vec![Err(GatewayError::DispatchRejected(
        "workflow input 'prompt' is invalid".to_string(),
    ))]);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::DispatchRejected));
    assert_eq!(harness.gateway.dispatch_calls(), 1);
    assert_eq!(harness.gateway.poll_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_existing_fork_is_reused() {
    let existing = ForkHandle::new(RepoPath::parse("relay-bot/repo").unwrap());
    let gateway = FakeGateway::new().script_forks(vec![Err(GatewayError::ForkConflict {
        fork: existing.clone(),
    })]);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.fork, Some(existing));
}

#[tokio::test(start_paused = true)]
async fn test_fork_transient_errors_exhaust_retries() {
    let unavailable = || Err(GatewayError::RemoteUnavailable("fork returned 502".to_string()));
    let gateway = FakeGateway::new().script_forks((0..10).map(|_| unavailable()).collect());
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::ForkFailed));
    assert_eq!(harness.gateway.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_and_transient_budgets_are_separate() {
    let unavailable = || Err(GatewayError::RemoteUnavailable("dispatch returned 502".to_string()));
    let gateway = FakeGateway::new().script_dispatches(vec![
        Err(not_ready()),
        Err(not_ready()),
        unavailable(),
        Ok(WorkflowRunId(42)),
    ]);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.workflow_run_id, Some(WorkflowRunId(42)));
    assert_eq!(harness.gateway.dispatch_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_transient_budget_exhausts_after_not_ready_retries() {
    let unavailable = || Err(GatewayError::RemoteUnavailable("dispatch returned 502".to_string()));
    let gateway = FakeGateway::new().script_dispatches(vec![
        Err(not_ready()),
        Err(not_ready()),
        unavailable(),
        unavailable(),
        unavailable(),
        Ok(WorkflowRunId(42)),
    ]);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::DispatchRetriesExhausted));
    // two not-ready retries, then the three attempts of the transient policy
    assert_eq!(harness.gateway.dispatch_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_job_times_out_and_polling_stops() {
    let gateway = FakeGateway::new().poll_fallback(PollFallback::KeepRunning);
    let harness = Harness::new(gateway);

    let start = tokio::time::Instant::now();
    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::TimedOut);
    assert_eq!(reason(&done), Some(FailureReason::TimedOut));
    assert!(harness.gateway.poll_calls() > 1);

    // Every poll happened inside the 300s ceiling
    let last_call = *harness.gateway.call_times().last().unwrap();
    assert!(last_call - start <= Duration::from_secs(300));

    let calls = harness.gateway.calls().len();
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(harness.gateway.calls().len(), calls);
    assert_eq!(
        harness.orchestrator.get(job.id).await.unwrap().status,
        JobStatus::TimedOut
    );
}

#[tokio::test(start_paused = true)]
async fn test_hung_poll_times_out_at_ceiling() {
    let gateway = FakeGateway::new().poll_fallback(PollFallback::Hang);
    let harness = Harness::new(gateway);

    let start = tokio::time::Instant::now();
    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::TimedOut);
    assert_eq!(reason(&done), Some(FailureReason::TimedOut));
    assert!(start.elapsed() <= Duration::from_secs(301));
    assert!(harness.gateway.poll_calls() > 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.orchestrator.active_jobs(), 0);
    assert_eq!(harness.notifier.count(job.id), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_fork_is_retried_as_transient() {
    let gateway = FakeGateway::new().with_delay(Duration::from_secs(3600));
    let harness = Harness::new(gateway);

    let start = tokio::time::Instant::now();
    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    // every fork attempt hits the 30s call timeout
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::ForkFailed));
    assert_eq!(harness.gateway.calls().len(), 3);
    assert!(start.elapsed() < Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_workflow_failure() {
    let gateway =
        FakeGateway::new().script_polls(vec![Ok(RunStatus::Completed(failure("cancelled")))]);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::WorkflowFailed));
    assert!(done.result.unwrap().detail.unwrap().contains("cancelled"));
}

#[tokio::test(start_paused = true)]
async fn test_pull_request_lookup_after_success() {
    let gateway = FakeGateway::new().with_pull_request(pr("org/repo", 9));
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.result.unwrap().pull_request, Some(pr("org/repo", 9)));
    assert!(harness.gateway.calls().contains(&Call::FindPullRequest(job.id)));
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_errors_keep_polling() {
    let gateway = FakeGateway::new().script_polls(vec![
        Err(GatewayError::RemoteUnavailable("poll returned 503".to_string())),
        Ok(RunStatus::NotFound),
        Ok(RunStatus::Running),
    ]);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(harness.gateway.poll_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_missing_run_fails_after_tolerance() {
    let gateway = FakeGateway::new().script_polls((0..20).map(|_| Ok(RunStatus::NotFound)).collect());
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::WorkflowNotFound));
    // five misses tolerated, the sixth gives up
    assert_eq!(harness.gateway.poll_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_idempotency_key_conflict_and_reuse() {
    let gateway = FakeGateway::new().poll_fallback(PollFallback::KeepRunning);
    let harness = Harness::new(gateway);

    let mut req = submission("org/repo", "fix bug X");
    req.idempotency_key = Some("ticket-17".to_string());

    let first = harness.orchestrator.submit(req.clone()).await.unwrap();
    assert_eq!(
        harness.orchestrator.submit(req.clone()).await.unwrap_err(),
        SubmitError::Duplicate { existing: first.id }
    );

    harness.orchestrator.cancel(first.id).await.unwrap();
    let done = harness.wait_for_terminal(first.id).await;
    assert_eq!(reason(&done), Some(FailureReason::Cancelled));

    let second = harness.orchestrator.submit(req).await.unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.status, JobStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_callback_failure_keeps_job_succeeded() {
    let notifier = RecordingNotifier::answering(CallbackState::Failed {
        attempts: 3,
        last_error: "callback request failed: connection refused".to_string(),
    });
    let harness = Harness::build(
        FakeGateway::new(),
        notifier,
        config(),
        Arc::new(JobRegistry::default()),
    );

    let mut req = submission("org/repo", "fix bug X");
    req.callback_url = Some("http://127.0.0.1:9/unreachable".to_string());
    let job = harness.orchestrator.submit(req).await.unwrap();
    assert_eq!(job.callback, CallbackState::Pending);

    let done = harness.wait_for_callback(job.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(matches!(done.callback, CallbackState::Failed { attempts: 3, .. }));
    assert_eq!(harness.notifier.count(job.id), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_bound() {
    let config = OrchestratorConfig {
        max_concurrent_jobs: 2,
        ..config()
    };
    let harness = Harness::build(
        FakeGateway::new().with_delay(Duration::from_secs(1)),
        RecordingNotifier::new(),
        config,
        Arc::new(JobRegistry::default()),
    );

    let mut ids = Vec::new();
    for i in 0..6 {
        let job = harness
            .orchestrator
            .submit(submission("org/repo", &format!("task {}", i)))
            .await
            .unwrap();
        ids.push(job.id);
    }
    assert_eq!(harness.orchestrator.active_jobs(), 2);
    assert_eq!(harness.orchestrator.queued_jobs(), 4);

    loop {
        assert!(harness.orchestrator.active_jobs() <= 2);
        let records = harness.orchestrator.list(Default::default()).await;
        if records.iter().all(|record| record.status.is_terminal()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    for id in &ids {
        let record = harness.orchestrator.get(*id).await.unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
    }
    assert!(harness.gateway.max_in_flight() <= 2);
    assert_eq!(harness.orchestrator.queued_jobs(), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.notifier.total(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_polling() {
    let gateway = FakeGateway::new().poll_fallback(PollFallback::KeepRunning);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    harness.wait_for_status(job.id, JobStatus::Polling).await;

    let flagged = harness.orchestrator.cancel(job.id).await.unwrap();
    assert!(flagged.cancel_requested);
    assert_eq!(flagged.status, JobStatus::Polling);

    let done = harness.wait_for_terminal(job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(reason(&done), Some(FailureReason::Cancelled));

    let polls = harness.gateway.poll_calls();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(harness.gateway.poll_calls(), polls);
    assert_eq!(harness.notifier.count(job.id), 1);
}

#[tokio::test(start_paused = true)]
async fn test_webhook_resolves_polling_job_once() {
    let gateway = FakeGateway::new().poll_fallback(PollFallback::KeepRunning);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let polling = harness.wait_for_status(job.id, JobStatus::Polling).await;

    let event = WorkflowWebhook {
        job_id: job.id,
        status: WebhookStatus::Completed,
        run_id: polling.workflow_run_id,
        pr_url: Some("https://github.com/org/repo/pull/7".to_string()),
        error: None,
    };
    let resolved = harness.orchestrator.apply_webhook(event.clone()).await.unwrap();
    assert_eq!(resolved.status, JobStatus::Succeeded);
    assert_eq!(
        resolved.result.unwrap().pull_request.unwrap().to_string(),
        "org/repo#7"
    );

    // A repeated report is a no-op
    let again = harness.orchestrator.apply_webhook(event).await.unwrap();
    assert_eq!(again.status, JobStatus::Succeeded);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(harness.notifier.count(job.id), 1);
    assert_eq!(
        harness.orchestrator.get(job.id).await.unwrap().status,
        JobStatus::Succeeded
    );
}

#[tokio::test(start_paused = true)]
async fn test_webhook_looks_up_pull_request_once_across_conflicts() {
    let registry = Arc::new(JobRegistry::default());
    let dispatched = stored(JobStatus::Dispatched, Some(55));
    registry.restore(vec![dispatched.clone()]).await;

    let gateway = FakeGateway::new()
        .with_delay(Duration::from_secs(1))
        .with_pull_request(pr("org/repo", 7))
        .poll_fallback(PollFallback::KeepRunning);
    let harness = Harness::build(gateway, RecordingNotifier::new(), config(), registry);

    let webhook = tokio::spawn({
        let orchestrator = harness.orchestrator.clone();
        let event = WorkflowWebhook {
            job_id: dispatched.id,
            status: WebhookStatus::Completed,
            run_id: Some(WorkflowRunId(55)),
            pr_url: None,
            error: None,
        };
        async move { orchestrator.apply_webhook(event).await }
    });

    // The driver moves the job to POLLING while the lookup is in flight
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.orchestrator.resume_restored().await, 1);

    let resolved = webhook.await.unwrap().unwrap();
    assert_eq!(resolved.status, JobStatus::Succeeded);
    assert_eq!(
        resolved.result.unwrap().pull_request.unwrap().to_string(),
        "org/repo#7"
    );

    let lookups = harness
        .gateway
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::FindPullRequest(_)))
        .count();
    assert_eq!(lookups, 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_matches_registry_after_racing_webhook() {
    let store = SlowStore::new(Duration::from_secs(5), |record| {
        record.status == JobStatus::Polling && record.attempt_count > 0
    });
    let registry = Arc::new(JobRegistry::new(Some(store.clone())));
    let gateway = FakeGateway::new().poll_fallback(PollFallback::KeepRunning);
    let harness = Harness::build(gateway, RecordingNotifier::new(), config(), registry);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    harness.wait_for_status(job.id, JobStatus::Polling).await;

    // The first poll count is still being written
    tokio::time::sleep(Duration::from_secs(1)).await;
    let event = WorkflowWebhook {
        job_id: job.id,
        status: WebhookStatus::Completed,
        run_id: None,
        pr_url: Some("https://github.com/org/repo/pull/9".to_string()),
        error: None,
    };
    let resolved = harness.orchestrator.apply_webhook(event).await.unwrap();
    assert_eq!(resolved.status, JobStatus::Succeeded);

    harness.wait_for_callback(job.id).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let current = harness.orchestrator.get(job.id).await.unwrap();
    assert_eq!(store.load_all().await.unwrap(), vec![current]);
}

#[tokio::test(start_paused = true)]
async fn test_webhook_failure_report() {
    let gateway = FakeGateway::new().poll_fallback(PollFallback::KeepRunning);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    harness.wait_for_status(job.id, JobStatus::Polling).await;

    let resolved = harness
        .orchestrator
        .apply_webhook(WorkflowWebhook {
            job_id: job.id,
            status: WebhookStatus::Failed,
            run_id: None,
            pr_url: None,
            error: Some("agent exited with code 1".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(resolved.status, JobStatus::Failed);
    let result = resolved.result.unwrap();
    assert_eq!(result.reason, Some(FailureReason::WorkflowFailed));
    assert_eq!(result.detail.as_deref(), Some("agent exited with code 1"));
}

#[tokio::test(start_paused = true)]
async fn test_webhook_rejected_before_dispatch() {
    let gateway = FakeGateway::new().with_delay(Duration::from_secs(3600));
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();

    let event = |job_id| WorkflowWebhook {
        job_id,
        status: WebhookStatus::Completed,
        run_id: None,
        pr_url: None,
        error: None,
    };

    assert_eq!(
        harness.orchestrator.apply_webhook(event(job.id)).await.unwrap_err(),
        WebhookError::NotDispatched(job.id)
    );

    let unknown = relay_core::domain::job::JobId::new();
    assert_eq!(
        harness.orchestrator.apply_webhook(event(unknown)).await.unwrap_err(),
        WebhookError::NotFound(unknown)
    );
}

#[tokio::test(start_paused = true)]
async fn test_crashed_task_fails_job() {
    let gateway = FakeGateway::new().poll_fallback(PollFallback::Panic);
    let harness = Harness::new(gateway);

    let job = harness
        .orchestrator
        .submit(submission("org/repo", "fix bug X"))
        .await
        .unwrap();
    let other = harness
        .orchestrator
        .submit(submission("org/other", "fix bug Y"))
        .await
        .unwrap();

    for id in [job.id, other.id] {
        let done = harness.wait_for_terminal(id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(reason(&done), Some(FailureReason::InternalError));
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.notifier.count(job.id), 1);
    assert_eq!(harness.orchestrator.active_jobs(), 0);
}

fn stored(status: JobStatus, run_id: Option<u64>) -> JobRecord {
    let mut record = JobRecord::new(NewJob {
        source_repo: RepoPath::parse("org/repo").unwrap(),
        target_owner: "relay-bot".to_string(),
        task_input: "fix bug X".to_string(),
        callback_url: None,
        idempotency_key: None,
    });
    record.status = status;
    record.workflow_run_id = run_id.map(WorkflowRunId);
    if status != JobStatus::Pending {
        record.fork = Some(ForkHandle::new(RepoPath::parse("relay-bot/repo").unwrap()));
    }
    if status.is_terminal() {
        record.result = Some(JobResult::succeeded(None));
    }
    record
}

#[tokio::test(start_paused = true)]
async fn test_resume_restored_jobs() {
    let registry = Arc::new(JobRegistry::default());
    let pending = stored(JobStatus::Pending, None);
    let forking = stored(JobStatus::Forking, None);
    let polling = stored(JobStatus::Polling, Some(55));
    let finished = stored(JobStatus::Succeeded, Some(56));
    let restored = registry
        .restore(vec![
            pending.clone(),
            forking.clone(),
            polling.clone(),
            finished.clone(),
        ])
        .await;
    assert_eq!(restored, 4);

    let harness = Harness::build(FakeGateway::new(), RecordingNotifier::new(), config(), registry);
    assert_eq!(harness.orchestrator.resume_restored().await, 2);

    let interrupted = harness.orchestrator.get(forking.id).await.unwrap();
    assert_eq!(interrupted.status, JobStatus::Failed);
    assert_eq!(reason(&interrupted), Some(FailureReason::Interrupted));

    let done = harness.wait_for_terminal(pending.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);

    let done = harness.wait_for_terminal(polling.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(harness.gateway.calls().contains(&Call::Poll(WorkflowRunId(55))));
    assert_eq!(harness.gateway.dispatch_calls(), 1);

    assert_eq!(
        harness.orchestrator.get(finished.id).await.unwrap(),
        finished
    );
}
