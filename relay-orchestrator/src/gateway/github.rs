//! GitHub gateway
//!
//! Implements the remote gateway over the GitHub REST API:
//! - Forking the source repository into the bot account or an organisation
//! - Dispatching the agent workflow hosted in the runner repository
//! - Polling the workflow run
//! - Finding the pull request opened from the job's branch

use std::time::Duration;

use async_trait::async_trait;
use relay_core::domain::job::{JobId, PullRequestRef, WorkflowRunId, agent_branch};
use relay_core::domain::repo::{ForkHandle, RepoPath};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{DispatchRequest, GatewayError, RemoteGateway, Result, RunOutcome, RunStatus};

const API_VERSION: &str = "2022-11-28";

/// Connection settings for the GitHub gateway
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// REST API base URL (e.g., "https://api.github.com")
    pub api_url: String,
    /// Token of the bot account
    pub token: String,
    /// Repository hosting the agent workflow
    pub runner_repo: RepoPath,
    /// Workflow file name (e.g., "agent.yml")
    pub workflow: String,
    /// Git ref the workflow is dispatched on
    pub workflow_ref: String,
    /// Bot account login; forks land here unless another owner is requested
    pub bot_username: String,
    /// Per-request deadline, connection setup included
    pub request_timeout: Duration,
}

/// GitHub implementation of RemoteGateway
pub struct GitHubGateway {
    client: Client,
    config: GitHubConfig,
}

impl GitHubGateway {
    pub fn new(config: GitHubConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self::with_client(config, client))
    }

    /// Creates a gateway with a custom HTTP client (timeouts, proxies, TLS)
    pub fn with_client(mut config: GitHubConfig, client: Client) -> Self {
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        Self { client, config }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.config.api_url, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, "relay-orchestrator")
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<reqwest::Response> {
        request.send().await.map_err(|e| {
            warn!("GitHub {} request failed: {}", operation, e);
            GatewayError::RemoteUnavailable(format!("{} request failed", operation))
        })
    }

    /// Checks that the fork has content the workflow can check out
    async fn fork_is_ready(&self, fork: &ForkHandle) -> Result<bool> {
        let path = format!("/repos/{}/branches?per_page=1", fork.repo);
        let response = self
            .send(self.request(Method::GET, &path), "fork readiness")
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => {
                let branches: Vec<serde_json::Value> = response
                    .json()
                    .await
                    .map_err(|_| parse_error("fork readiness"))?;
                Ok(!branches.is_empty())
            }
            status => Err(classify(status, response.headers(), "fork readiness")),
        }
    }
}

#[async_trait]
impl RemoteGateway for GitHubGateway {
    async fn fork(&self, source: &RepoPath, target_owner: &str) -> Result<ForkHandle> {
        let mut body = json!({ "default_branch_only": true });
        if target_owner != self.config.bot_username {
            body["organization"] = json!(target_owner);
        }

        let path = format!("/repos/{}/forks", source);
        let response = self
            .send(self.request(Method::POST, &path).json(&body), "fork")
            .await?;

        match response.status() {
            status if status.is_success() => {
                let fork: RepositoryResponse =
                    response.json().await.map_err(|_| parse_error("fork"))?;
                debug!("GitHub accepted fork of {} as {}", source, fork.full_name);
                RepoPath::parse(&fork.full_name)
                    .map(ForkHandle::new)
                    .map_err(GatewayError::Rejected)
            }
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let fork =
                    ForkHandle::expected(source, target_owner).map_err(GatewayError::Rejected)?;
                Err(GatewayError::ForkConflict { fork })
            }
            status => Err(classify(status, response.headers(), "fork")),
        }
    }

    async fn dispatch_workflow(
        &self,
        fork: &ForkHandle,
        request: &DispatchRequest,
    ) -> Result<WorkflowRunId> {
        if !self.fork_is_ready(fork).await? {
            return Err(GatewayError::NotReady(format!(
                "fork {} has no branches yet",
                fork
            )));
        }

        let path = format!(
            "/repos/{}/actions/workflows/{}/dispatches",
            self.config.runner_repo, self.config.workflow
        );
        let body = json!({
            "ref": self.config.workflow_ref,
            "inputs": {
                "job_id": request.job_id.to_string(),
                "upstream_repo": request.source_repo.to_string(),
                "fork_repo": fork.repo.to_string(),
                "branch": agent_branch(request.job_id),
                "prompt": request.task_input,
            },
            "return_run_details": true,
        });

        let response = self
            .send(self.request(Method::POST, &path).json(&body), "dispatch")
            .await?;

        match response.status() {
            // The run was triggered, but without an id it cannot be tracked
            StatusCode::NO_CONTENT => Err(GatewayError::DispatchRejected(
                "dispatch accepted without run details".to_string(),
            )),
            status if status.is_success() => {
                let details: DispatchResponse =
                    response.json().await.map_err(|_| parse_error("dispatch"))?;
                Ok(WorkflowRunId(details.workflow_run_id))
            }
            status @ (StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND
            | StatusCode::UNPROCESSABLE_ENTITY) => Err(GatewayError::DispatchRejected(format!(
                "dispatch returned {}",
                status
            ))),
            status => Err(classify(status, response.headers(), "dispatch")),
        }
    }

    async fn poll_status(&self, run_id: WorkflowRunId) -> Result<RunStatus> {
        let path = format!(
            "/repos/{}/actions/runs/{}",
            self.config.runner_repo, run_id
        );
        let response = self
            .send(self.request(Method::GET, &path), "poll")
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(RunStatus::NotFound),
            status if status.is_success() => {
                let run: WorkflowRunResponse =
                    response.json().await.map_err(|_| parse_error("poll"))?;
                Ok(run_status_from(run))
            }
            status => Err(classify(status, response.headers(), "poll")),
        }
    }

    async fn find_pull_request(
        &self,
        source: &RepoPath,
        fork: &ForkHandle,
        job_id: JobId,
    ) -> Result<Option<PullRequestRef>> {
        let path = format!(
            "/repos/{}/pulls?head={}:{}&state=all&per_page=1",
            source,
            fork.owner(),
            agent_branch(job_id)
        );
        let response = self
            .send(self.request(Method::GET, &path), "pull request lookup")
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let pulls: Vec<PullResponse> = response
                    .json()
                    .await
                    .map_err(|_| parse_error("pull request lookup"))?;
                Ok(pulls.into_iter().next().map(|pull| PullRequestRef {
                    repo: source.clone(),
                    number: pull.number,
                    url: Some(pull.html_url),
                }))
            }
            status => Err(classify(status, response.headers(), "pull request lookup")),
        }
    }
}

// =============================================================================
// Response Mapping
// =============================================================================

/// Maps a non-success response that no operation handles specially
fn classify(status: StatusCode, headers: &HeaderMap, operation: &str) -> GatewayError {
    let rate_limited = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    if status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
        || (status == StatusCode::FORBIDDEN && rate_limited)
    {
        GatewayError::RemoteUnavailable(format!("{} returned {}", operation, status))
    } else {
        GatewayError::Rejected(format!("{} returned {}", operation, status))
    }
}

fn parse_error(operation: &str) -> GatewayError {
    GatewayError::RemoteUnavailable(format!("{} returned an unreadable response", operation))
}

fn run_status_from(run: WorkflowRunResponse) -> RunStatus {
    if run.status != "completed" {
        return RunStatus::Running;
    }

    RunStatus::Completed(RunOutcome {
        success: run.conclusion.as_deref() == Some("success"),
        conclusion: run.conclusion,
        pull_request: None,
        run_url: run.html_url,
    })
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    workflow_run_id: u64,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunResponse {
    status: String,
    conclusion: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}
