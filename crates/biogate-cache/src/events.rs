use biogate_core::GatewayEvent;
use std::time::Instant;

/// Events emitted by the response cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A live entry was found.
    Hit {
        name: String,
        key: String,
        timestamp: Instant,
    },
    /// No live entry was found.
    Miss {
        name: String,
        key: String,
        timestamp: Instant,
    },
    /// A value was stored.
    Stored {
        name: String,
        key: String,
        timestamp: Instant,
    },
}

impl GatewayEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Stored { .. } => "stored",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Stored { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            CacheEvent::Hit { name, .. }
            | CacheEvent::Miss { name, .. }
            | CacheEvent::Stored { name, .. } => name,
        }
    }
}
