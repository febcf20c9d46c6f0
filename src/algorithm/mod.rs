//! Pure, deterministic bucket algorithms.
//!
//! Both algorithms are ordinary functions of `(state, policy, now_ticks,
//! requested_tokens)` — no storage access, no async, no global state. That is
//! deliberate: the same function body is the reference oracle these tests
//! check against *and* the model the atomic Redis script in
//! [`crate::storage::redis`] must match bit-for-bit.

pub mod leaky_bucket;
pub mod token_bucket;

use crate::policy::{Algorithm, Policy};

/// Opaque per-bucket state persisted in the shared store.
///
/// `primary` is `Tokens` for [`Algorithm::TokenBucket`] and `WaterLevel` for
/// [`Algorithm::LeakyBucket`]. `last_update_ticks` is `LastRefillTicks` /
/// `LastDripTicks`; zero means the key has never been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BucketState {
    pub primary: f64,
    pub last_update_ticks: i64,
}

/// The outcome of a single evaluation: the `Counters` shape plus the fields the
/// atomic evaluator and the sliding-window counter need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalOutcome {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: f64,
    pub used: f64,
    pub retry_after_ticks: i64,
    pub reset_after_ticks: i64,
}

/// Evaluate `policy`'s algorithm against `state` (`None` means an
/// uninitialised key) at `now_ticks`, requesting `requested_tokens`.
pub fn evaluate(
    state: Option<BucketState>,
    policy: &Policy,
    now_ticks: i64,
    requested_tokens: f64,
) -> (BucketState, EvalOutcome) {
    match policy.algorithm() {
        Algorithm::TokenBucket => token_bucket::evaluate(state, policy, now_ticks, requested_tokens),
        Algorithm::LeakyBucket => leaky_bucket::evaluate(state, policy, now_ticks, requested_tokens),
    }
}
