//! Error types for the rate-limiting decision engine.
//!
//! The hierarchy mirrors the error taxonomy of the design: `ValidationError`,
//! `ConfigError`, and `Cancelled` are the only kinds that ever surface from
//! the [`crate::coordinator::DecisionCoordinator`]'s public entry point.
//! `StorageError`, `RepositoryError`, and `AuditError` are returned by the
//! lower-level collaborator traits so those traits remain independently
//! testable, but the coordinator contains them (logs and falls back) rather
//! than propagating them.

use thiserror::Error;

/// Result type used throughout the crate's public entry points.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Top-level error returned by the decision engine's public entry points.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The request or the policy it targets is malformed. Fail fast, never retried.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration is unusable; initialisation must abort.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller cancelled the request while store I/O was in flight.
    ///
    /// If the atomic script had already executed server-side, its state
    /// mutation stands; the caller must treat the decision as unknown.
    #[error("request cancelled")]
    Cancelled,
}

/// Bad request or bad policy. Never retried.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    /// `ShouldAllow` was called with `tokens = 0`.
    #[error("requested token count must be at least 1")]
    ZeroTokensRequested,

    /// The resolved policy failed [`crate::policy::Policy::validate`].
    #[error("policy is invalid: {0}")]
    InvalidPolicy(#[from] ConfigError),
}

/// Configuration is unusable. Aborts initialisation.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("policy '{name}': permit_limit must be positive")]
    NonPositivePermitLimit { name: String },

    #[error("policy '{name}': window must be positive")]
    NonPositiveWindow { name: String },

    #[error("policy '{name}': precision must be positive")]
    NonPositivePrecision { name: String },

    #[error("policy '{name}': cooldown, if set, must be positive")]
    NonPositiveCooldown { name: String },

    #[error("policy name must not be empty")]
    EmptyPolicyName,

    #[error("policy '{name}': tokens_per_request must be positive")]
    NonPositiveTokensPerRequest { name: String },

    #[error("refill rate underflowed to zero for policy '{name}' (permit_limit / window)")]
    DegenerateRefillRate { name: String },

    #[error("redis key prefix must not be empty")]
    EmptyKeyPrefix,

    #[error("redis key ttl must be at least 1s")]
    KeyTtlTooShort,

    #[error("sliding window bucket count must be greater than 1, got {count}")]
    InvalidSlidingWindowBucketCount { count: u32 },
}

/// The shared store is unreachable, or the atomic script errored.
///
/// Returned by [`crate::storage::Storage`] implementations. The coordinator
/// catches this, logs it, and returns a fail-open [`crate::decision::Decision`]
/// rather than propagating it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("atomic script execution failed: {0}")]
    ScriptFailed(String),

    #[error("store operation timed out")]
    Timeout,

    #[error("failed to (de)serialize stored bucket state: {0}")]
    Serialization(String),

    #[error("connection pool exhausted")]
    PoolExhausted,
}

/// Policy refresh against the repository failed. The previous cache snapshot
/// is retained; the next scheduled or triggered refresh will retry.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("policy repository fetch failed: {0}")]
    FetchFailed(String),
}

/// The audit sink failed to record a deny event. Logged; never affects the
/// decision already returned to the caller.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink insert failed: {0}")]
    InsertFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_wraps_config_error() {
        let cfg = ConfigError::EmptyPolicyName;
        let err = ValidationError::InvalidPolicy(cfg.clone());
        assert_eq!(err, ValidationError::InvalidPolicy(cfg));
    }

    #[test]
    fn display_messages_are_stable() {
        let err = ConfigError::NonPositivePermitLimit {
            name: "api".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "policy 'api': permit_limit must be positive"
        );
    }
}
