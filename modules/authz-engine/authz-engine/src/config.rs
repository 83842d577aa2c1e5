//! Configuration for the authorization engine.

use std::path::Path;
use std::time::Duration;

use authz_engine_sdk::ResourceType;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `AUTHZ__CACHE__MAX_ENTRIES=500`.
pub const ENV_PREFIX: &str = "AUTHZ__";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthzEngineConfig {
    /// When `false` every check is granted (development setups without identity).
    pub enforcement_enabled: bool,
    pub cache: CacheConfig,
    pub aggregation: AggregationConfig,
    pub remote: RemoteConfig,
}

impl Default for AuthzEngineConfig {
    fn default() -> Self {
        Self {
            enforcement_enabled: true,
            cache: CacheConfig::default(),
            aggregation: AggregationConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_entries: usize,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    /// Maximum number of ancestors above a resource.
    pub max_depth: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self { max_depth: 8 }
    }
}

/// What to do when the remote evaluator cannot answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Resolve with the local resolver; the decision is not cached.
    Local,
    /// Fail the check as temporarily unavailable.
    #[default]
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub enabled: bool,
    /// Resource types evaluated remotely; everything else stays local.
    pub resource_types: Vec<ResourceType>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub fallback: FallbackMode,
    pub breaker: BreakerConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resource_types: Vec::new(),
            timeout: Duration::from_millis(500),
            fallback: FallbackMode::Deny,
            breaker: BreakerConfig::default(),
        }
    }
}

impl RemoteConfig {
    #[must_use]
    pub fn applies_to(&self, resource_type: ResourceType) -> bool {
        self.enabled && self.resource_types.contains(&resource_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    /// When off, remote calls go straight through, still bounded by the timeout.
    pub enabled: bool,
    /// Failures inside the window that open the breaker.
    pub failure_threshold: u32,
    /// Number of most recent calls the window remembers.
    pub window_size: usize,
    /// Age after which a recorded call leaves the window.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// Concurrent trial calls allowed while half-open.
    pub half_open_trials: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            window_size: 10,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            half_open_trials: 1,
        }
    }
}

impl AuthzEngineConfig {
    /// Load defaults, then the optional YAML file, then `AUTHZ__*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be parsed or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_entries == 0 {
            return Err(ConfigError::invalid("cache.max_entries", "must be positive"));
        }
        if self.cache.ttl.is_zero() {
            return Err(ConfigError::invalid("cache.ttl", "must be positive"));
        }
        if self.aggregation.max_depth == 0 {
            return Err(ConfigError::invalid("aggregation.max_depth", "must be positive"));
        }
        self.remote.validate()
    }
}

impl RemoteConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.resource_types.is_empty() {
            return Err(ConfigError::invalid(
                "remote.resource_types",
                "at least one resource type is required when remote evaluation is enabled",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("remote.timeout", "must be positive"));
        }
        let b = &self.breaker;
        if b.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "remote.breaker.failure_threshold",
                "must be positive",
            ));
        }
        if b.window_size < usize::try_from(b.failure_threshold).unwrap_or(usize::MAX) {
            return Err(ConfigError::invalid(
                "remote.breaker.window_size",
                format!("must be at least failure_threshold ({})", b.failure_threshold),
            ));
        }
        if b.window.is_zero() {
            return Err(ConfigError::invalid("remote.breaker.window", "must be positive"));
        }
        if b.cooldown.is_zero() {
            return Err(ConfigError::invalid("remote.breaker.cooldown", "must be positive"));
        }
        if b.half_open_trials == 0 {
            return Err(ConfigError::invalid(
                "remote.breaker.half_open_trials",
                "must be positive",
            ));
        }
        Ok(())
    }
}
