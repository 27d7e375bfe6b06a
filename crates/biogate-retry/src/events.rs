use biogate_core::GatewayEvent;
use std::time::{Duration, Instant};

/// Events emitted by the retry controller.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to be made after `delay`.
    Retry {
        name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    /// The operation succeeded, on the first try or after retries.
    Success {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Every attempt failed with a retryable error.
    Exhausted {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// A non-retryable error ended the operation early.
    IgnoredError {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
}

impl GatewayEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            RetryEvent::Retry { name, .. }
            | RetryEvent::Success { name, .. }
            | RetryEvent::Exhausted { name, .. }
            | RetryEvent::IgnoredError { name, .. } => name,
        }
    }
}
