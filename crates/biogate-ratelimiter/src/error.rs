use std::time::Duration;
use thiserror::Error;

/// Errors returned by the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimiterError {
    /// No token became available within the allowed wait.
    #[error("rate limit exceeded for '{key}', retry after {retry_after:?}")]
    RateLimited {
        /// Bucket key that was limited.
        key: String,
        /// Time until the next token is available.
        retry_after: Duration,
    },
}

impl RateLimiterError {
    /// Returns the advised wait before trying again.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimiterError::RateLimited { retry_after, .. } => *retry_after,
        }
    }
}

/// Errors returned by [`RateLimiterService`](crate::RateLimiterService).
#[derive(Debug, Error)]
pub enum RateLimitedServiceError<E> {
    /// The request was rate limited before reaching the inner service.
    #[error(transparent)]
    RateLimited(RateLimiterError),
    /// An error returned by the inner service.
    #[error("{0}")]
    Inner(E),
}

impl<E> RateLimitedServiceError<E> {
    /// Returns true if the request was rate limited.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RateLimitedServiceError::RateLimited(_))
    }
}
