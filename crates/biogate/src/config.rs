//! Gateway configuration.
//!
//! Every section has defaults, so an empty document is a valid
//! configuration:
//!
//! ```rust
//! use biogate::config::GatewayConfig;
//!
//! let config = GatewayConfig::from_toml_str(r#"
//!     [retry]
//!     max_attempts = 4
//!
//!     [rate_limit.domains.pubtator3]
//!     capacity = 3.0
//!     refill_rate = 3.0
//!
//!     [circuit_breaker.domains.clinicaltrials]
//!     failure_threshold = 3
//! "#).unwrap();
//!
//! assert_eq!(config.retry.max_attempts, 4);
//! assert!(config.pool.enabled);
//! ```

use biogate_circuitbreaker::{BreakerConfig, BreakerConfigError, BreakerRegistry};
use biogate_pool::PoolConfig;
use biogate_ratelimiter::{BucketConfig, BucketConfigError, RateLimiter};
use biogate_retry::{RetryConfigError, RetryPolicy, DEFAULT_RETRYABLE_STATUSES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::descriptor::RateLimitMode;

/// Environment variable enabling offline mode.
pub const OFFLINE_ENV: &str = "BIOGATE_OFFLINE";
/// Environment variable that disables connection pooling when false.
pub const CONNECTION_POOL_ENV: &str = "BIOGATE_CONNECTION_POOL";

/// Errors returned while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The retry section is invalid.
    #[error("invalid retry policy: {0}")]
    Retry(#[from] RetryConfigError),
    /// A circuit breaker section is invalid.
    #[error("invalid circuit breaker config for '{name}': {source}")]
    Breaker {
        /// `default` or the domain name.
        name: String,
        /// Underlying error.
        #[source]
        source: BreakerConfigError,
    },
    /// A rate limit section is invalid.
    #[error("invalid rate limit for '{name}': {source}")]
    Bucket {
        /// `default` or the domain name.
        name: String,
        /// Underlying error.
        #[source]
        source: BucketConfigError,
    },
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Serve cache hits only and never touch the network.
    pub offline: bool,
    /// Connection pooling.
    pub pool: PoolSection,
    /// Default retry policy.
    pub retry: RetrySection,
    /// Circuit breakers.
    pub circuit_breaker: BreakerSection,
    /// Rate limiting.
    pub rate_limit: RateLimitSection,
    /// Response cache.
    pub cache: CacheSection,
}

/// `[pool]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSection {
    pub enabled: bool,
    pub max_keepalive: usize,
    pub max_connections: usize,
    pub keepalive_expiry_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        let defaults = PoolConfig::default();
        Self {
            enabled: defaults.enabled,
            max_keepalive: defaults.max_keepalive,
            max_connections: defaults.max_connections,
            keepalive_expiry_secs: defaults.keepalive_expiry.as_secs(),
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl PoolSection {
    /// Converts to the pool manager's configuration.
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig {
            enabled: self.enabled,
            max_keepalive: self.max_keepalive,
            max_connections: self.max_connections,
            keepalive_expiry: Duration::from_secs(self.keepalive_expiry_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// `[retry]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
            jitter: true,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetrySection {
    /// Builds and validates the retry policy.
    pub fn to_policy(&self) -> Result<RetryPolicy, RetryConfigError> {
        RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .exponential_base(self.exponential_base)
            .jitter(self.jitter)
            .retryable_statuses(self.retryable_statuses.iter().copied())
            .build()
    }
}

/// Thresholds of one circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub success_threshold: u32,
    pub half_open_max_calls: Option<u32>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            success_threshold: 2,
            half_open_max_calls: None,
        }
    }
}

impl BreakerSettings {
    fn to_config(&self, name: &str) -> Result<BreakerConfig, ConfigError> {
        let mut builder = BreakerConfig::builder()
            .failure_threshold(self.failure_threshold)
            .recovery_timeout(Duration::from_secs(self.recovery_timeout_secs))
            .success_threshold(self.success_threshold);
        if let Some(n) = self.half_open_max_calls {
            builder = builder.half_open_max_calls(n);
        }
        builder.build().map_err(|source| ConfigError::Breaker {
            name: name.to_string(),
            source,
        })
    }
}

/// `[circuit_breaker]`: default thresholds plus per-domain overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSection {
    #[serde(flatten)]
    pub default: BreakerSettings,
    pub domains: BTreeMap<String, BreakerSettings>,
}

impl BreakerSection {
    /// Builds a breaker registry with the configured overrides.
    pub fn to_registry(&self) -> Result<BreakerRegistry, ConfigError> {
        let mut registry = BreakerRegistry::new(self.default.to_config("default")?);
        for (domain, settings) in &self.domains {
            registry = registry.with_override(domain.clone(), settings.to_config(domain)?);
        }
        Ok(registry)
    }
}

/// Capacity and refill rate of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BucketSettings {
    pub capacity: f64,
    pub refill_rate: f64,
}

impl Default for BucketSettings {
    fn default() -> Self {
        let defaults = BucketConfig::default();
        Self {
            capacity: defaults.capacity(),
            refill_rate: defaults.refill_rate(),
        }
    }
}

impl BucketSettings {
    fn to_config(self, name: &str) -> Result<BucketConfig, ConfigError> {
        BucketConfig::new(self.capacity, self.refill_rate).map_err(|source| ConfigError::Bucket {
            name: name.to_string(),
            source,
        })
    }
}

/// `[rate_limit]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSection {
    #[serde(flatten)]
    pub default: BucketSettings,
    /// Fail immediately instead of waiting for a token.
    pub fail_fast: bool,
    /// Longest a request waits for a token.
    pub max_wait_ms: u64,
    pub domains: BTreeMap<String, BucketSettings>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            default: BucketSettings::default(),
            fail_fast: false,
            max_wait_ms: 5_000,
            domains: BTreeMap::new(),
        }
    }
}

impl RateLimitSection {
    /// Builds a rate limiter with the configured overrides.
    pub fn to_limiter(&self) -> Result<RateLimiter, ConfigError> {
        let mut limiter = RateLimiter::new(self.default.to_config("default")?);
        for (domain, settings) in &self.domains {
            limiter = limiter.with_override(domain.clone(), settings.to_config(domain)?);
        }
        Ok(limiter)
    }

    /// The mode used when a request does not choose one.
    pub fn mode(&self) -> RateLimitMode {
        if self.fail_fast {
            RateLimitMode::FailFast
        } else {
            RateLimitMode::Wait {
                max_wait: Duration::from_millis(self.max_wait_ms),
            }
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSection {
    /// When false, responses are neither read from nor written to the cache.
    pub enabled: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl GatewayConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file, then applies the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Default configuration with the environment applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Applies `BIOGATE_OFFLINE` and `BIOGATE_CONNECTION_POOL`.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Applies the environment controls read through `var`.
    pub fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var(OFFLINE_ENV) {
            self.offline = is_truthy(&value);
        }
        if let Some(value) = var(CONNECTION_POOL_ENV) {
            if is_falsy(&value) {
                self.pool.enabled = false;
            }
        }
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.to_policy()?;
        self.circuit_breaker.to_registry()?;
        self.rate_limit.to_limiter()?;
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn is_falsy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}
