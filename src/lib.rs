//! A distributed rate-limiting decision engine.
//!
//! `ratequota_core` answers one question — "should this request be
//! admitted?" — for any number of fleet members sharing one store. It owns:
//!
//! - **Policies** ([`policy`]): validated, immutable rate-limit definitions.
//! - **Identity** ([`identity`]): deterministic storage-key composition.
//! - **Algorithms** ([`algorithm`]): pure Token Bucket / Leaky Bucket functions.
//! - **Storage** ([`storage`]): the atomic evaluator — in-memory or Redis via
//!   a genuine `EVAL`'d Lua script, so concurrent fleet members never race.
//! - **The policy cache** ([`cache`]): an atomically-swapped snapshot merged
//!   from configuration and a pluggable repository.
//! - **The sliding-window counter** ([`sliding_window`]): lock-free
//!   observability, independent of the enforcement decision.
//! - **The coordinator** ([`coordinator`]): composes all of the above into
//!   a single `should_allow` call.
//!
//! It does not speak HTTP, read configuration files, or own a database
//! connection — those are the enclosing application's job; this crate
//! defines the interfaces ([`collaborators`], [`config`]) they plug into.
//!
//! # Quick start
//!
//! ```ignore
//! use ratequota_core::prelude::*;
//! use ratequota_core::collaborators::{EmptyPolicyRepository, NullAuditSink};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let policy = Policy::new("api", Algorithm::TokenBucket, 10, Duration::from_secs(1)).unwrap();
//!     let cache = Arc::new(PolicyCache::new(Arc::new(EmptyPolicyRepository), vec![policy], Duration::ZERO));
//!     cache.initialize(true).await;
//!
//!     let coordinator = DecisionCoordinator::new(
//!         MemoryStorage::new(), cache, NullAuditSink, None, Duration::from_secs(10), 5,
//!     );
//!
//!     let request = RateLimitRequest::new("api", Identity::anonymous().with_user_id("u1"), 1);
//!     match coordinator.should_allow(&request).await.unwrap() {
//!         Some(decision) if decision.is_allowed => println!("allowed"),
//!         Some(decision) => println!("denied, retry after {:?}", decision.retry_after),
//!         None => println!("unknown policy, pass through"),
//!     }
//! }
//! ```
//!
//! # Feature flags
//!
//! - `memory` (default): in-memory storage backed by `DashMap`.
//! - `redis`: Redis storage backed by `deadpool-redis` and a Lua `EVAL` script.

pub mod algorithm;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod decision;
pub mod error;
pub mod identity;
pub mod policy;
pub mod sliding_window;
pub mod storage;
pub mod ticks;

pub use cache::{PolicyCache, PolicySnapshot};
pub use collaborators::{AuditEntry, AuditSink, PolicyRepository};
pub use config::RateLimiterConfig;
pub use coordinator::{DecisionCoordinator, RateLimitRequest};
pub use decision::{Counters, Decision};
pub use error::{ConfigError, RateLimitError, Result, StorageError, ValidationError};
pub use identity::{compose_key, Identity};
pub use policy::{Algorithm, Policy, PolicyBuilder};
pub use sliding_window::{SlidingWindowCounter, SlidingWindowSample};
pub use storage::Storage;

#[cfg(feature = "memory")]
pub use storage::{GcConfig, GcInterval, MemoryStorage};

#[cfg(feature = "redis")]
pub use storage::{RedisConfig, RedisStorage};

/// Convenience re-exports for application code wiring up the engine.
pub mod prelude {
    pub use crate::cache::PolicyCache;
    pub use crate::collaborators::{AuditSink, PolicyRepository};
    pub use crate::coordinator::{DecisionCoordinator, RateLimitRequest};
    pub use crate::decision::Decision;
    pub use crate::error::{RateLimitError, Result};
    pub use crate::identity::Identity;
    pub use crate::policy::{Algorithm, Policy};
    pub use crate::storage::Storage;

    #[cfg(feature = "memory")]
    pub use crate::storage::MemoryStorage;

    #[cfg(feature = "redis")]
    pub use crate::storage::RedisStorage;
}
