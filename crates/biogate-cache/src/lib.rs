//! Volatile response cache.
//!
//! [`ResponseCache`] maps a request's cache key to a decoded response body
//! with a per-entry TTL. Expiry is lazy: an entry is dropped when a lookup
//! finds it expired. Empty values (null, empty strings, arrays and objects)
//! are never stored, so an upstream hiccup is not served for a whole TTL.
//!
//! There is no single-flight coalescing: concurrent misses for the same key
//! each reach the upstream.
//!
//! ## Usage
//!
//! ```rust
//! use biogate_cache::ResponseCache;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let cache = ResponseCache::new("responses");
//! let body = cache
//!     .memoize("gene:BRCA2", Duration::from_secs(300), false, || async {
//!         Ok::<_, std::io::Error>(json!({ "symbol": "BRCA2", "entrezgene": 675 }))
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(cache.get("gene:BRCA2"), Some(body));
//! # }
//! ```

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use events::CacheEvent;
pub use layer::{Bypass, CacheLayer, CacheService, FnBypass, NeverBypass};
pub use store::ResponseCache;
pub use value::CacheValue;

mod events;
mod layer;
mod store;
mod value;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "cache_requests_total",
            "Total number of cache lookups by result (hit or miss)"
        );
    });
}
