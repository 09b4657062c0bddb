//! Orchestrator configuration
//!
//! Every tunable of the service: provider credentials, admission bounds,
//! retry and polling schedules, callback delivery and persistence.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use relay_core::domain::repo::RepoPath;

use crate::gateway::GitHubConfig;
use crate::service::{OrchestratorConfig, OrchestratorPolicies, PollPolicy, RetryPolicy};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Façade listen address
    pub bind_addr: SocketAddr,

    /// Remote API credential
    pub github_token: String,

    /// Provider base URL (e.g., "https://api.github.com")
    pub github_api_url: String,

    /// Repository hosting the agent workflow
    pub runner_repo: String,

    /// Workflow file dispatched for each job
    pub workflow: String,

    /// Git ref the workflow is dispatched on
    pub workflow_ref: String,

    /// Account owning forks when a submission names no target owner
    pub bot_username: String,

    /// Shared secret for webhook verification and callback signing
    pub webhook_secret: Option<String>,

    /// Accept unsigned webhooks when no secret is configured
    pub allow_insecure_webhooks: bool,

    pub max_concurrent_jobs: usize,

    /// Hard limit on jobs waiting for a slot; `None` queues without bound
    pub queue_depth_limit: Option<usize>,

    /// Concurrent provider calls across all jobs
    pub gateway_max_in_flight: usize,

    /// Deadline of a single provider call
    pub gateway_timeout: Duration,

    pub dispatch_max_attempts: u32,
    pub dispatch_backoff: Duration,
    pub dispatch_max_backoff: Duration,

    pub poll_interval: Duration,
    pub poll_max_interval: Duration,

    /// Wall-clock polling ceiling before a job is `TIMED_OUT`
    pub job_timeout: Duration,

    pub callback_max_attempts: u32,
    pub callback_backoff: Duration,
    pub callback_timeout: Duration,

    /// Directory of the JSON job store; persistence is off when unset
    pub state_dir: Option<PathBuf>,

    /// Age after which terminal jobs are evicted; kept forever when unset
    pub retention: Option<Duration>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Required: `GITHUB_TOKEN`, `RELAY_RUNNER_REPO`, `RELAY_BOT_USERNAME`.
    /// Everything else falls back to the defaults of [`Config::default`].
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", key))
        };

        let defaults = Self::default();

        Ok(Self {
            bind_addr: parse_or(&var, "RELAY_BIND_ADDR", defaults.bind_addr)?,
            github_token: required("GITHUB_TOKEN")?,
            github_api_url: var("RELAY_GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            runner_repo: required("RELAY_RUNNER_REPO")?,
            workflow: var("RELAY_WORKFLOW").unwrap_or(defaults.workflow),
            workflow_ref: var("RELAY_WORKFLOW_REF").unwrap_or(defaults.workflow_ref),
            bot_username: required("RELAY_BOT_USERNAME")?,
            webhook_secret: var("RELAY_WEBHOOK_SECRET"),
            allow_insecure_webhooks: parse_or(&var, "RELAY_ALLOW_INSECURE_WEBHOOKS", false)?,
            max_concurrent_jobs: parse_or(
                &var,
                "RELAY_MAX_CONCURRENT_JOBS",
                defaults.max_concurrent_jobs,
            )?,
            queue_depth_limit: parse_opt(&var, "RELAY_QUEUE_DEPTH_LIMIT")?,
            gateway_max_in_flight: parse_or(
                &var,
                "RELAY_GATEWAY_MAX_IN_FLIGHT",
                defaults.gateway_max_in_flight,
            )?,
            gateway_timeout: secs_or(
                &var,
                "RELAY_GATEWAY_TIMEOUT_SECS",
                defaults.gateway_timeout,
            )?,
            dispatch_max_attempts: parse_or(
                &var,
                "RELAY_DISPATCH_MAX_ATTEMPTS",
                defaults.dispatch_max_attempts,
            )?,
            dispatch_backoff: millis_or(&var, "RELAY_DISPATCH_BACKOFF_MS", defaults.dispatch_backoff)?,
            dispatch_max_backoff: millis_or(
                &var,
                "RELAY_DISPATCH_MAX_BACKOFF_MS",
                defaults.dispatch_max_backoff,
            )?,
            poll_interval: secs_or(&var, "RELAY_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            poll_max_interval: secs_or(
                &var,
                "RELAY_POLL_MAX_INTERVAL_SECS",
                defaults.poll_max_interval,
            )?,
            job_timeout: secs_or(&var, "RELAY_JOB_TIMEOUT_SECS", defaults.job_timeout)?,
            callback_max_attempts: parse_or(
                &var,
                "RELAY_CALLBACK_MAX_ATTEMPTS",
                defaults.callback_max_attempts,
            )?,
            callback_backoff: millis_or(&var, "RELAY_CALLBACK_BACKOFF_MS", defaults.callback_backoff)?,
            callback_timeout: secs_or(
                &var,
                "RELAY_CALLBACK_TIMEOUT_SECS",
                defaults.callback_timeout,
            )?,
            state_dir: var("RELAY_STATE_DIR").map(PathBuf::from),
            retention: parse_opt::<u64, _>(&var, "RELAY_RETENTION_SECS")?.map(Duration::from_secs),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.github_token.is_empty() {
            anyhow::bail!("github_token cannot be empty");
        }

        if !self.github_api_url.starts_with("http://") && !self.github_api_url.starts_with("https://")
        {
            anyhow::bail!("github_api_url must start with http:// or https://");
        }

        RepoPath::parse(&self.runner_repo)
            .map_err(|e| anyhow::anyhow!("runner_repo is not a valid owner/repo: {}", e))?;

        if self.workflow.is_empty() || self.workflow_ref.is_empty() {
            anyhow::bail!("workflow and workflow_ref cannot be empty");
        }

        if self.bot_username.is_empty() {
            anyhow::bail!("bot_username cannot be empty");
        }

        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }

        if self.gateway_max_in_flight == 0 {
            anyhow::bail!("gateway_max_in_flight must be greater than 0");
        }

        if self.gateway_timeout.is_zero() {
            anyhow::bail!("gateway_timeout must be greater than 0");
        }

        if self.dispatch_max_attempts == 0 || self.callback_max_attempts == 0 {
            anyhow::bail!("retry attempt counts must be greater than 0");
        }

        if self.dispatch_backoff.is_zero() || self.dispatch_max_backoff < self.dispatch_backoff {
            anyhow::bail!("dispatch backoff must be positive and not exceed its cap");
        }

        if self.poll_interval.is_zero() || self.poll_max_interval < self.poll_interval {
            anyhow::bail!("poll interval must be positive and not exceed its cap");
        }

        if self.job_timeout.is_zero() {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.callback_backoff.is_zero() || self.callback_timeout.is_zero() {
            anyhow::bail!("callback backoff and timeout must be greater than 0");
        }

        if self.retention.is_some_and(|retention| retention.is_zero()) {
            anyhow::bail!("retention must be greater than 0");
        }

        Ok(())
    }

    pub fn github(&self) -> anyhow::Result<GitHubConfig> {
        Ok(GitHubConfig {
            api_url: self.github_api_url.trim_end_matches('/').to_string(),
            token: self.github_token.clone(),
            runner_repo: RepoPath::parse(&self.runner_repo)
                .map_err(|e| anyhow::anyhow!("invalid runner repo: {}", e))?,
            workflow: self.workflow.clone(),
            workflow_ref: self.workflow_ref.clone(),
            bot_username: self.bot_username.clone(),
            request_timeout: self.gateway_timeout,
        })
    }

    pub fn policies(&self) -> OrchestratorPolicies {
        let dispatch = RetryPolicy::new(
            self.dispatch_max_attempts,
            self.dispatch_backoff,
            self.dispatch_max_backoff,
        );
        let callback_cap = (self.callback_backoff * 30).max(self.callback_backoff);

        OrchestratorPolicies {
            not_ready: dispatch.clone(),
            transient: dispatch,
            poll: PollPolicy::new(self.poll_interval, self.poll_max_interval, self.job_timeout),
            callback: RetryPolicy::new(
                self.callback_max_attempts,
                self.callback_backoff,
                callback_cap,
            ),
            call_timeout: self.gateway_timeout,
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent_jobs: self.max_concurrent_jobs,
            queue_depth_limit: self.queue_depth_limit,
            default_owner: self.bot_username.clone(),
            policies: self.policies(),
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(var, key)?.unwrap_or(default))
}

fn parse_opt<T, F>(var: &F, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {:?}", key, value))
        })
        .transpose()
}

fn secs_or<F>(var: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt::<u64, _>(var, key)?
        .map(Duration::from_secs)
        .unwrap_or(default))
}

fn millis_or<F>(var: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt::<u64, _>(var, key)?
        .map(Duration::from_millis)
        .unwrap_or(default))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            github_token: "dev-token".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            runner_repo: "relay-dev/agent-runner".to_string(),
            workflow: "agent.yml".to_string(),
            workflow_ref: "main".to_string(),
            bot_username: "relay-bot".to_string(),
            webhook_secret: None,
            allow_insecure_webhooks: false,
            max_concurrent_jobs: 4,
            queue_depth_limit: None,
            gateway_max_in_flight: 8,
            gateway_timeout: Duration::from_secs(30),
            dispatch_max_attempts: 8,
            dispatch_backoff: Duration::from_millis(2000),
            dispatch_max_backoff: Duration::from_millis(60_000),
            poll_interval: Duration::from_secs(15),
            poll_max_interval: Duration::from_secs(60),
            job_timeout: Duration::from_secs(3600),
            callback_max_attempts: 5,
            callback_backoff: Duration::from_millis(1000),
            callback_timeout: Duration::from_secs(10),
            state_dir: None,
            retention: None,
        }
    }
}
