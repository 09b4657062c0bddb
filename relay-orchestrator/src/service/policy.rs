//! Retry and polling policies
//!
//! One policy type decides every wait in the orchestrator: dispatch retries
//! while a fork propagates, dispatch retries after transient provider errors,
//! and callback delivery retries. Polling has its own interval schedule bounded
//! by a wall-clock ceiling.

use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff
///
/// `attempt` is the number of failed attempts so far (1 after the first
/// failure). `next_delay` returns `None` once `max_attempts` attempts have
/// been made, meaning "give up".
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Randomise each delay between half and all of its computed value
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Wait before the next attempt, or `None` to give up
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }

        let delay = self.base_delay(attempt);
        if !self.jitter || delay.is_zero() {
            return Some(delay);
        }

        let half = delay / 2;
        let spread = rand::rng().random_range(0.0..=1.0);
        Some(half + half.mul_f64(spread))
    }

    /// Delay before jitter is applied
    fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        scaled(self.initial_delay, factor, self.max_delay)
    }
}

/// Poll scheduling for a dispatched workflow run
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Interval after the first poll
    pub interval: Duration,
    /// Upper bound for the slowly growing interval
    pub max_interval: Duration,
    /// Growth factor applied per poll
    pub growth: f64,
    /// Wall-clock ceiling measured from the start of polling
    pub timeout: Duration,
    /// Consecutive `NOT_FOUND` polls tolerated before the run is considered lost
    pub max_missing: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            max_interval,
            growth: 1.5,
            timeout,
            max_missing: 5,
        }
    }

    /// Interval to wait after poll number `attempt` (1-based)
    pub fn interval_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.growth.max(1.0).powi(exponent);
        scaled(self.interval, factor, self.max_interval)
    }
}

fn scaled(base: Duration, factor: f64, cap: Duration) -> Duration {
    let nanos = (base.as_nanos() as f64 * factor).min(cap.as_nanos() as f64);
    Duration::from_nanos(nanos.round() as u64)
}

/// All policies used by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorPolicies {
    /// Dispatch retries while the fork is not ready
    pub not_ready: RetryPolicy,
    /// Retries after transient provider errors (fork and dispatch)
    pub transient: RetryPolicy,
    pub poll: PollPolicy,
    pub callback: RetryPolicy,
    /// Upper bound on a single fork, dispatch or poll call
    pub call_timeout: Duration,
}

impl Default for OrchestratorPolicies {
    fn default() -> Self {
        Self {
            not_ready: RetryPolicy::new(8, Duration::from_secs(2), Duration::from_secs(60)),
            transient: RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(30)),
            poll: PollPolicy::new(
                Duration::from_secs(15),
                Duration::from_secs(60),
                Duration::from_secs(3600),
            ),
            callback: RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(30)),
            call_timeout: Duration::from_secs(60),
        }
    }
}
