use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

// Absorbs float error when a caller sleeps exactly the advised duration.
const EPSILON: f64 = 1e-9;

/// Capacity and refill rate of a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    capacity: f64,
    refill_rate: f64,
}

/// Errors returned when a bucket configuration is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BucketConfigError {
    /// Capacity below one token.
    #[error("capacity must be at least 1, got {0}")]
    Capacity(f64),
    /// Refill rate not strictly positive.
    #[error("refill rate must be positive, got {0}")]
    RefillRate(f64),
}

impl BucketConfig {
    /// Creates a bucket configuration holding `capacity` tokens and adding
    /// `refill_rate` tokens per second.
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self, BucketConfigError> {
        if !capacity.is_finite() || capacity < 1.0 {
            return Err(BucketConfigError::Capacity(capacity));
        }
        if !refill_rate.is_finite() || refill_rate <= 0.0 {
            return Err(BucketConfigError::RefillRate(refill_rate));
        }
        Ok(Self {
            capacity,
            refill_rate,
        })
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

impl Default for BucketConfig {
    /// 20 tokens, refilled at 10 per second.
    fn default() -> Self {
        Self {
            capacity: 20.0,
            refill_rate: 10.0,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// A token was taken.
    Allowed,
    /// No token was available; one will be after `retry_after`.
    Limited {
        /// Time until the next token is available.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Returns true for [`RateDecision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[derive(Debug)]
pub(crate) struct TokenBucket {
    config: BucketConfig,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub(crate) fn new(config: BucketConfig) -> Self {
        Self {
            config,
            tokens: config.capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.config.refill_rate).min(self.config.capacity);
        self.last_refill = now;
    }

    pub(crate) fn try_take(&mut self) -> RateDecision {
        self.refill();

        if self.tokens + EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            return RateDecision::Allowed;
        }

        let missing = 1.0 - self.tokens;
        let nanos = (missing / self.config.refill_rate * 1e9).ceil();
        RateDecision::Limited {
            retry_after: Duration::from_nanos(nanos as u64),
        }
    }

    pub(crate) fn tokens(&mut self) -> f64 {
        self.refill();
        self.tokens
    }
}
