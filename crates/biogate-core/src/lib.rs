//! Core infrastructure for biogate.
//!
//! Every outbound request made by the biogate dispatcher flows through a
//! stack of resilience components. This crate holds what they share:
//! - Event system for observability ([`events`])
//! - Error classification used by the circuit breaker and retry controller
//!   ([`classify`])
//! - The transport error taxonomy ([`error`])

pub mod classify;
pub mod error;
pub mod events;

pub use classify::{ClassSet, Classify, ErrorKind};
pub use error::TransportError;
pub use events::{EventListener, EventListeners, FnListener, GatewayEvent};
