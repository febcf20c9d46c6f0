//! Typed configuration schema. This crate does not read files or
//! environment variables itself; it only defines the shape an external
//! loader deserializes into.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::{Algorithm, Policy, PolicyBuilder};

fn default_redis_key_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_sliding_window() -> Duration {
    Duration::from_secs(10)
}

fn default_sliding_window_buckets() -> u32 {
    10
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub connection_string: String,
    pub key_prefix: String,
    #[serde(with = "humantime_serde", default = "default_redis_key_ttl")]
    pub key_ttl: Duration,
    #[serde(default)]
    pub database: Option<i64>,
}

/// Sliding-window observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SlidingWindowSettings {
    #[serde(with = "humantime_serde", default = "default_sliding_window")]
    pub window: Duration,
    #[serde(default = "default_sliding_window_buckets")]
    pub buckets: u32,
    #[serde(default)]
    pub enabled: bool,
}

impl Default for SlidingWindowSettings {
    fn default() -> Self {
        Self {
            window: default_sliding_window(),
            buckets: default_sliding_window_buckets(),
            enabled: false,
        }
    }
}

/// A single policy entry as it appears in configuration, mirroring the
/// [`Policy`] data model before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    pub name: String,
    pub algorithm: Algorithm,
    pub permit_limit: u64,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    #[serde(default)]
    pub burst_limit: Option<u64>,
    #[serde(default, with = "humantime_serde::option")]
    pub precision: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub cooldown: Option<Duration>,
    #[serde(default)]
    pub tokens_per_request: Option<u64>,
    #[serde(default)]
    pub sliding_window_metrics_enabled: bool,
}

impl PolicyConfig {
    pub fn into_policy(self) -> Result<Policy, ConfigError> {
        let mut builder = PolicyBuilder::new(self.name, self.algorithm, self.permit_limit, self.window)
            .sliding_window_metrics_enabled(self.sliding_window_metrics_enabled);
        if let Some(burst) = self.burst_limit {
            builder = builder.burst_limit(burst);
        }
        if let Some(precision) = self.precision {
            builder = builder.precision(precision);
        }
        if let Some(cooldown) = self.cooldown {
            builder = builder.cooldown(cooldown);
        }
        if let Some(tokens) = self.tokens_per_request {
            builder = builder.tokens_per_request(tokens);
        }
        builder.build()
    }
}

/// The full configuration schema.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimiterConfig {
    pub redis: RedisSettings,
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    #[serde(default, with = "humantime_serde")]
    pub policy_reload_interval: Duration,
    #[serde(default)]
    pub audit_logging_enabled: bool,
    #[serde(default)]
    pub sliding_window: SlidingWindowSettings,
    #[serde(default)]
    pub warm_policies_on_startup: bool,
}

impl RateLimiterConfig {
    /// Validate the fields this crate is directly responsible for (the
    /// `Redis.KeyPrefix`/`Redis.KeyTtl` rules and each inline policy).
    /// `Postgres.*`/repository wiring is an external concern and is not
    /// validated here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis.key_prefix.is_empty() {
            return Err(ConfigError::EmptyKeyPrefix);
        }
        if self.redis.key_ttl < Duration::from_secs(10) {
            return Err(ConfigError::KeyTtlTooShort);
        }
        if self.sliding_window.enabled && self.sliding_window.buckets <= 1 {
            return Err(ConfigError::InvalidSlidingWindowBucketCount {
                count: self.sliding_window.buckets,
            });
        }
        for policy in &self.policies {
            policy.clone().into_policy()?;
        }
        Ok(())
    }

    /// Resolve the configured policies into validated [`Policy`] values,
    /// skipping (and logging) any that fail validation rather than
    /// aborting — the same rule the policy cache applies to repository
    /// entries.
    pub fn resolved_policies(&self) -> Vec<Policy> {
        self.policies
            .iter()
            .filter_map(|config| match config.clone().into_policy() {
                Ok(policy) => Some(policy),
                Err(error) => {
                    tracing::warn!(policy = config.name, %error, "skipping invalid configured policy");
                    None
                }
            })
            .collect()
    }
}
