//! Cache storage.

use crate::events::CacheEvent;
use crate::value::CacheValue;
use biogate_core::{EventListeners, FnListener};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// In-memory cache of decoded response bodies with per-entry TTL.
///
/// Expired entries are dropped when they are next looked up; nothing runs in
/// the background. Empty values and zero TTLs are never stored.
#[derive(Debug)]
pub struct ResponseCache<V> {
    name: String,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    event_listeners: EventListeners<CacheEvent>,
}

impl<V: CacheValue + Clone> ResponseCache<V> {
    /// Creates an empty cache reporting as `name`.
    pub fn new(name: impl Into<String>) -> Self {
        crate::describe_metrics();
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
            event_listeners: EventListeners::new(),
        }
    }

    /// Registers a callback invoked on every hit with the key.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CacheEvent| {
                if let CacheEvent::Hit { key, .. } = event {
                    f(key);
                }
            }));
        self
    }

    /// Registers a callback invoked on every miss with the key.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CacheEvent| {
                if let CacheEvent::Miss { key, .. } = event {
                    f(key);
                }
            }));
        self
    }

    /// Registers a listener for every cache event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Returns the cache's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the live value for `key`, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let found = {
            let mut entries = self.lock();
            let now = Instant::now();
            match entries.get(key) {
                Some(entry) if entry.is_expired(now) => {
                    entries.remove(key);
                    None
                }
                Some(entry) => Some(entry.value.clone()),
                None => None,
            }
        };

        if found.is_some() {
            #[cfg(feature = "tracing")]
            tracing::debug!(cache = %self.name, key, "cache hit");

            #[cfg(feature = "metrics")]
            counter!("cache_requests_total", "cache" => self.name.clone(), "result" => "hit")
                .increment(1);

            self.event_listeners.emit(&CacheEvent::Hit {
                name: self.name.clone(),
                key: key.to_string(),
                timestamp: std::time::Instant::now(),
            });
        } else {
            #[cfg(feature = "metrics")]
            counter!("cache_requests_total", "cache" => self.name.clone(), "result" => "miss")
                .increment(1);

            self.event_listeners.emit(&CacheEvent::Miss {
                name: self.name.clone(),
                key: key.to_string(),
                timestamp: std::time::Instant::now(),
            });
        }

        found
    }

    /// Stores `value` under `key` for `ttl`.
    ///
    /// Does nothing and returns false when `ttl` is zero or the value is
    /// empty. A TTL too large to add to the current instant never expires.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        if ttl.is_zero() || value.is_empty_value() {
            return false;
        }

        let key = key.into();
        let expires_at = Instant::now().checked_add(ttl);

        #[cfg(feature = "tracing")]
        tracing::debug!(cache = %self.name, key = %key, ?ttl, "cache store");

        self.event_listeners.emit(&CacheEvent::Stored {
            name: self.name.clone(),
            key: key.clone(),
            timestamp: std::time::Instant::now(),
        });
        self.lock().insert(key, CacheEntry { value, expires_at });
        true
    }

    /// Removes `key`, returning its value if it was present and live.
    pub fn remove(&self, key: &str) -> Option<V> {
        let entry = self.lock().remove(key)?;
        (!entry.is_expired(Instant::now())).then_some(entry.value)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the number of stored entries, including expired ones not yet
    /// looked up.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Returns the cached value for `key`, or runs `op` and caches its
    /// successful, non-empty result for `ttl`.
    ///
    /// With `bypass` set the cache is neither read nor written. Concurrent
    /// misses for the same key each run `op`.
    pub async fn memoize<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        bypass: bool,
        op: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if bypass {
            return op().await;
        }
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = op().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
