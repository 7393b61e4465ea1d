//! Retry policy and per-task retry bookkeeping

use crate::config::RetryConfig;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Jitter multiplies the capped delay by a factor in [1 - JITTER, 1 + JITTER]
const JITTER: f64 = 0.2;

/// Why an attempt failed transiently
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Response with a retryable status
    Status(u16),
    /// Request timed out
    Timeout,
    /// Connection-level failure (refused, reset, DNS, TLS, body read)
    Connection(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Timeout => write!(f, "timeout"),
            Self::Connection(e) => write!(f, "connection error: {}", e),
        }
    }
}

/// Exponential backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Base delay in seconds
    pub backoff_factor: f64,
    /// Cap for a single delay in seconds
    pub max_backoff: f64,
    pub jitter: bool,
    statuses: HashSet<u16>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            max_backoff: config.max_backoff,
            jitter: config.jitter,
            statuses: config.statuses.iter().copied().collect(),
        }
    }

    /// Returns true if a response with this status should be retried
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }

    /// Returns true if another retry is allowed after `retries_done` retries
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Un-jittered delay before retry number `attempt` (0 for the first retry)
    ///
    /// `min(backoff_factor * 2^attempt, max_backoff)`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(62) as i32;
        let secs = (self.backoff_factor * 2f64.powi(exponent)).min(self.max_backoff);
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Delay before retry number `attempt`, jittered when enabled
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter {
            return base;
        }
        let factor = rand::random_range((1.0 - JITTER)..=(1.0 + JITTER));
        base.mul_f64(factor)
    }
}

/// Transient retry bookkeeping for a single fetch
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Retries performed so far
    pub attempt: u32,
    pub last_cause: Option<FailureCause>,
    pub next_delay: Option<Duration>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a transient failure; returns the delay to wait, or None if retries are exhausted
    pub fn record_failure(&mut self, policy: &RetryPolicy, cause: FailureCause) -> Option<Duration> {
        self.last_cause = Some(cause);
        if !policy.should_retry(self.attempt) {
            self.next_delay = None;
            return None;
        }
        let delay = policy.delay_for(self.attempt);
        self.attempt += 1;
        self.next_delay = Some(delay);
        Some(delay)
    }

    /// Total requests issued so far, counting the first
    pub fn requests_made(&self) -> u32 {
        self.attempt + 1
    }
}
