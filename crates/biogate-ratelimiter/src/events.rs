use biogate_core::GatewayEvent;
use std::time::{Duration, Instant};

/// Events emitted by the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A token was taken, possibly after waiting.
    Allowed {
        key: String,
        timestamp: Instant,
        waited: Duration,
    },
    /// No token was available within the allowed wait.
    Limited {
        key: String,
        timestamp: Instant,
        retry_after: Duration,
    },
}

impl GatewayEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::Allowed { .. } => "allowed",
            RateLimiterEvent::Limited { .. } => "limited",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::Allowed { timestamp, .. }
            | RateLimiterEvent::Limited { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            RateLimiterEvent::Allowed { key, .. } | RateLimiterEvent::Limited { key, .. } => key,
        }
    }
}
