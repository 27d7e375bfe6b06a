use crate::{BreakerConfig, CircuitBreaker, CircuitState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Get-or-create registry of breakers, one per name.
///
/// Breakers are created lazily on first use and live as long as the
/// registry. Names map 1:1 to domain keys.
#[derive(Debug)]
pub struct BreakerRegistry {
    default_config: Arc<BreakerConfig>,
    overrides: HashMap<String, Arc<BreakerConfig>>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Creates a registry whose breakers use `default_config`.
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            default_config: Arc::new(default_config),
            overrides: HashMap::new(),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Uses `config` for the breaker named `name` instead of the default.
    ///
    /// Only affects breakers created after this call.
    pub fn with_override(mut self, name: impl Into<String>, config: BreakerConfig) -> Self {
        self.overrides.insert(name.into(), Arc::new(config));
        self
    }

    /// Returns the breaker for `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.lock();
        if let Some(breaker) = breakers.get(name) {
            return Arc::clone(breaker);
        }

        let config = self
            .overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_config));

        #[cfg(feature = "tracing")]
        tracing::debug!(breaker = name, "creating circuit breaker");

        let breaker = Arc::new(CircuitBreaker::new(name, config));
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Returns the breaker for `name` if one exists.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.lock().get(name).cloned()
    }

    /// Returns the names of all breakers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the state of every breaker, sorted by name.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        let mut states: Vec<(String, CircuitState)> = self
            .lock()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// Resets every breaker to closed.
    pub fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> = self.lock().values().cloned().collect();
        for breaker in breakers {
            breaker.reset();
        }
    }

    /// Returns the number of breakers created so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no breaker has been created yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
