//! Resilient outbound requests for biomedical REST APIs.
//!
//! Every outbound call goes through one [`Dispatcher`], which applies, in
//! order:
//!
//! 1. offline mode (cache hits only)
//! 2. endpoint validation against the [`EndpointRegistry`]
//! 3. the response cache
//! 4. a per-domain token bucket
//! 5. a per-domain circuit breaker
//! 6. a pooled HTTP client, with the attempt wrapped in retry
//!
//! Failures come back as a [`RequestError`] carrying an HTTP-like status:
//! 503 for offline mode and open circuits, 429 when rate limited, 599 when
//! the upstream could not be reached or kept failing, 400 for unknown
//! endpoints, and the upstream's own status for other client errors.
//!
//! ```rust,no_run
//! use biogate::{Dispatcher, RequestDescriptor};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), biogate::RequestError> {
//! biogate::telemetry::init_tracing();
//! let dispatcher = Dispatcher::new();
//! let ctx = dispatcher.context();
//!
//! let genes = ctx
//!     .scope(dispatcher.dispatch(
//!         &RequestDescriptor::get("https://mygene.info/v3/query")
//!             .payload(json!({"q": "symbol:BRAF"}))
//!             .endpoint_key("mygene_query")
//!             .cache_ttl(Duration::from_secs(3600))
//!             .build(),
//!     ))
//!     .await?;
//! # let _ = genes;
//! # Ok(())
//! # }
//! ```
//!
//! The resilience components live in their own crates and are re-exported
//! here for callers that want to use them directly.

pub mod config;
mod descriptor;
mod dispatcher;
pub mod endpoints;
mod error;
pub mod telemetry;
pub mod transport;

pub use config::{ConfigError, GatewayConfig};
pub use descriptor::{canonical_json, RateLimitMode, RequestDescriptor, RequestDescriptorBuilder};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use endpoints::{EndpointCategory, EndpointInfo, EndpointRegistry};
pub use error::{ErrorReason, RequestError, NETWORK_ERROR};
pub use transport::{ReqwestTransport, Transport, TransportRequest};

pub use biogate_cache as cache;
pub use biogate_circuitbreaker as circuitbreaker;
pub use biogate_core::{ClassSet, Classify, ErrorKind, TransportError};
pub use biogate_pool as pool;
pub use biogate_ratelimiter as ratelimiter;
pub use biogate_retry as retry;

pub use reqwest::Method;
pub use serde_json::Value;
