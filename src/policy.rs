//! Policy value objects: the immutable, validated description of a named
//! rate limit and the algorithm that enforces it.
//!
//! A [`Policy`] is never mutated in place once constructed; the
//! [`crate::cache::PolicyCache`] replaces whole snapshots instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ticks::{duration_to_ticks, TICKS_PER_SECOND};

/// Which bucket algorithm a policy is enforced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    TokenBucket,
    LeakyBucket,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::TokenBucket => "token_bucket",
            Algorithm::LeakyBucket => "leaky_bucket",
        }
    }
}

/// A named, validated rate-limit configuration.
///
/// Construct with [`PolicyBuilder`] or [`Policy::new`]; both funnel through
/// [`Policy::validate`] so an invalid policy can never be handed to the
/// algorithms or the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    name: String,
    algorithm: Algorithm,
    permit_limit: u64,
    window: Duration,
    /// Raw configured burst limit; `<= 0` (unset/absent) falls back to `permit_limit`.
    /// Use [`Policy::burst_capacity`] for the resolved value.
    burst_limit: Option<u64>,
    precision: Duration,
    cooldown: Option<Duration>,
    tokens_per_request: u64,
    sliding_window_metrics_enabled: bool,
}

impl Policy {
    /// Construct and validate a policy in one step.
    pub fn new(
        name: impl Into<String>,
        algorithm: Algorithm,
        permit_limit: u64,
        window: Duration,
    ) -> Result<Self, ConfigError> {
        PolicyBuilder::new(name, algorithm, permit_limit, window).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn permit_limit(&self) -> u64 {
        self.permit_limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn precision(&self) -> Duration {
        self.precision
    }

    pub fn cooldown(&self) -> Option<Duration> {
        self.cooldown
    }

    pub fn tokens_per_request(&self) -> u64 {
        self.tokens_per_request
    }

    pub fn sliding_window_metrics_enabled(&self) -> bool {
        self.sliding_window_metrics_enabled
    }

    /// Resolved burst capacity: `max(burst_limit, permit_limit)`, with a
    /// missing or non-positive `burst_limit` treated as unset.
    pub fn burst_capacity(&self) -> u64 {
        match self.burst_limit {
            Some(b) if b > 0 => b.max(self.permit_limit),
            _ => self.permit_limit,
        }
    }

    pub fn window_ticks(&self) -> i64 {
        duration_to_ticks(self.window)
    }

    pub fn precision_ticks(&self) -> i64 {
        duration_to_ticks(self.precision)
    }

    pub fn cooldown_ticks(&self) -> Option<i64> {
        self.cooldown.map(duration_to_ticks)
    }

    /// Steady-state refill/leak rate in units per tick: `permit_limit / window`.
    pub fn rate_per_tick(&self) -> f64 {
        self.permit_limit as f64 / self.window_ticks() as f64
    }

    /// Validation rules. Called by the builder and by the cache on
    /// every configured/repository entry before it is admitted to a snapshot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyPolicyName);
        }
        if self.permit_limit == 0 {
            return Err(ConfigError::NonPositivePermitLimit {
                name: self.name.clone(),
            });
        }
        if self.window.is_zero() {
            return Err(ConfigError::NonPositiveWindow {
                name: self.name.clone(),
            });
        }
        if self.precision.is_zero() {
            return Err(ConfigError::NonPositivePrecision {
                name: self.name.clone(),
            });
        }
        if matches!(self.cooldown, Some(c) if c.is_zero()) {
            return Err(ConfigError::NonPositiveCooldown {
                name: self.name.clone(),
            });
        }
        if self.tokens_per_request == 0 {
            return Err(ConfigError::NonPositiveTokensPerRequest {
                name: self.name.clone(),
            });
        }
        if self.rate_per_tick() <= 0.0 {
            return Err(ConfigError::DegenerateRefillRate {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Builder for [`Policy`], mirroring the defaults a configuration loader
/// would apply: precision defaults to 100ms of slack and `tokens_per_request`
/// defaults to 1.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    name: String,
    algorithm: Algorithm,
    permit_limit: u64,
    window: Duration,
    burst_limit: Option<u64>,
    precision: Duration,
    cooldown: Option<Duration>,
    tokens_per_request: u64,
    sliding_window_metrics_enabled: bool,
}

impl PolicyBuilder {
    pub fn new(
        name: impl Into<String>,
        algorithm: Algorithm,
        permit_limit: u64,
        window: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            algorithm,
            permit_limit,
            window,
            burst_limit: None,
            precision: Duration::from_millis(100),
            cooldown: None,
            tokens_per_request: 1,
            sliding_window_metrics_enabled: false,
        }
    }

    pub fn burst_limit(mut self, burst: u64) -> Self {
        self.burst_limit = Some(burst);
        self
    }

    pub fn precision(mut self, precision: Duration) -> Self {
        self.precision = precision;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn tokens_per_request(mut self, tokens: u64) -> Self {
        self.tokens_per_request = tokens;
        self
    }

    pub fn sliding_window_metrics_enabled(mut self, enabled: bool) -> Self {
        self.sliding_window_metrics_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<Policy, ConfigError> {
        let policy = Policy {
            name: self.name,
            algorithm: self.algorithm,
            permit_limit: self.permit_limit,
            window: self.window,
            burst_limit: self.burst_limit,
            precision: self.precision,
            cooldown: self.cooldown,
            tokens_per_request: self.tokens_per_request,
            sliding_window_metrics_enabled: self.sliding_window_metrics_enabled,
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[cfg(test)]
const _: () = assert!(TICKS_PER_SECOND == 10_000_000);
