use biogate_core::{Classify, ErrorKind};
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

const JITTER: f64 = 0.1;

/// Errors returned when a retry policy is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryConfigError {
    /// `max_attempts` was zero.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    /// `exponential_base` was below 1 or not a number.
    #[error("exponential_base must be >= 1.0, got {0}")]
    InvalidBase(f64),
    /// `initial_delay` was longer than `max_delay`.
    #[error("initial_delay ({initial:?}) exceeds max_delay ({max:?})")]
    DelayOrder {
        /// Configured initial delay.
        initial: Duration,
        /// Configured maximum delay.
        max: Duration,
    },
}

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter: bool,
    retryable_statuses: HashSet<u16>,
    retryable_kinds: HashSet<ErrorKind>,
    excluded_kinds: HashSet<ErrorKind>,
}

impl RetryPolicy {
    /// Creates a new policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        RetryPolicyBuilder::new().max_attempts(1).unchecked()
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor between consecutive delays.
    pub fn exponential_base(&self) -> f64 {
        self.exponential_base
    }

    /// Whether delays are randomized by ±10%.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Checks the policy's values.
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError::ZeroAttempts);
        }
        if self.exponential_base.is_nan() || self.exponential_base < 1.0 {
            return Err(RetryConfigError::InvalidBase(self.exponential_base));
        }
        if self.initial_delay > self.max_delay {
            return Err(RetryConfigError::DelayOrder {
                initial: self.initial_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }

    /// Delay before retry `n` (0-indexed), without jitter.
    ///
    /// `min(initial_delay * exponential_base^n, max_delay)`
    pub fn base_delay(&self, n: u32) -> Duration {
        let exponent = n.min(i32::MAX as u32) as i32;
        let nanos = self.initial_delay.as_nanos() as f64 * self.exponential_base.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            self.max_delay
        } else {
            Duration::from_nanos(nanos.max(0.0) as u64)
        }
    }

    /// Delay before retry `n` (0-indexed), with jitter if enabled.
    ///
    /// Never exceeds `max_delay`.
    pub fn calculate_delay(&self, n: u32) -> Duration {
        let delay = self.base_delay(n);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::rng().random_range((1.0 - JITTER)..=(1.0 + JITTER));
        delay.mul_f64(factor).min(self.max_delay)
    }

    /// Returns true if `error` should be retried.
    ///
    /// Excluded kinds are never retried. HTTP failures are retried when their
    /// status is in the retryable set; other failures when their kind is.
    pub fn is_retryable<E: Classify + ?Sized>(&self, error: &E) -> bool {
        let kind = error.kind();
        if self.excluded_kinds.contains(&kind) {
            return false;
        }
        match error.status() {
            Some(status) => self.retryable_statuses.contains(&status),
            None => self.retryable_kinds.contains(&kind),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyBuilder::new().unchecked()
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - initial_delay: 1 second
    /// - max_delay: 60 seconds
    /// - exponential_base: 2.0
    /// - jitter: enabled
    /// - retryable statuses: 408, 429, 500, 502, 503, 504
    /// - retryable kinds: connect timeout, read timeout, connection error
    /// - excluded kinds: none
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
                exponential_base: 2.0,
                jitter: true,
                retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
                retryable_kinds: ErrorKind::TRANSIENT.into_iter().collect(),
                excluded_kinds: HashSet::new(),
            },
        }
    }

    /// Total attempts, including the first.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.policy.max_attempts = n;
        self
    }

    /// Delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Upper bound on any single delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Growth factor between consecutive delays.
    pub fn exponential_base(mut self, base: f64) -> Self {
        self.policy.exponential_base = base;
        self
    }

    /// Enables or disables ±10% jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.policy.jitter = enabled;
        self
    }

    /// Replaces the set of retryable HTTP status codes.
    pub fn retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.policy.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Replaces the set of retryable error kinds.
    pub fn retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.policy.retryable_kinds = kinds.into_iter().collect();
        self
    }

    /// Sets kinds that are never retried, whatever else matches.
    pub fn excluded_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.policy.excluded_kinds = kinds.into_iter().collect();
        self
    }

    /// Validates and builds the policy.
    pub fn build(self) -> Result<RetryPolicy, RetryConfigError> {
        self.policy.validate()?;
        Ok(self.policy)
    }

    fn unchecked(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
