//! Atomic Store Evaluator: the trait storage backends implement to
//! apply a policy's algorithm to a key's bucket state as a single atomic
//! step, and the backends themselves.
//!
//! The trait is deliberately narrow — one method, a fixed argument list, a
//! fixed return shape — instead of a generic read-modify-write closure.
//! A closure can't cross into a Redis Lua script, and distributed evaluation requires a
//! genuine server-side atomic script for the distributed backend, so every
//! implementation owns its own atomicity mechanism: [`memory::MemoryStorage`]
//! uses `DashMap::entry`, [`redis::RedisStorage`] uses `EVALSHA`. Both are
//! driven by the exact same arithmetic as [`crate::algorithm`] — the memory
//! backend calls it directly, the Redis script mirrors it line for line.
//! `tests/redis_script_equivalence.rs` checks the two stay equivalent
//! against a real Redis instance.

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "memory")]
pub use memory::{GcConfig, GcInterval, MemoryStorage};
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisStorage};

use std::future::Future;
use std::time::Duration;

use crate::algorithm::EvalOutcome;
use crate::error::StorageError;
use crate::policy::Policy;

/// Shared store backing the atomic evaluator.
///
/// All storage operations are async to support both local and distributed
/// backends. Implementations must be thread-safe (`Send + Sync`).
pub trait Storage: Send + Sync + 'static {
    /// Apply `policy`'s algorithm to `key`'s bucket state at `now_ticks`,
    /// admitting `requested_tokens`, and persist the result with the given
    /// TTL — all as one atomic step.
    ///
    /// Returns [`StorageError`] if the store is unreachable or the script
    /// failed; callers (the decision coordinator) decide whether to fail
    /// open rather than this trait deciding for them.
    fn evaluate(
        &self,
        key: &str,
        policy: &Policy,
        now_ticks: i64,
        requested_tokens: f64,
        ttl: Duration,
    ) -> impl Future<Output = Result<EvalOutcome, StorageError>> + Send;

    /// Discard a key's bucket state, as if it had never been evaluated.
    fn reset(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    async fn evaluate(
        &self,
        key: &str,
        policy: &Policy,
        now_ticks: i64,
        requested_tokens: f64,
        ttl: Duration,
    ) -> Result<EvalOutcome, StorageError> {
        (**self).evaluate(key, policy, now_ticks, requested_tokens, ttl).await
    }

    async fn reset(&self, key: &str) -> Result<(), StorageError> {
        (**self).reset(key).await
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    async fn evaluate(
        &self,
        key: &str,
        policy: &Policy,
        now_ticks: i64,
        requested_tokens: f64,
        ttl: Duration,
    ) -> Result<EvalOutcome, StorageError> {
        (**self).evaluate(key, policy, now_ticks, requested_tokens, ttl).await
    }

    async fn reset(&self, key: &str) -> Result<(), StorageError> {
        (**self).reset(key).await
    }
}
