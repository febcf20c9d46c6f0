//! Decision Coordinator: composes the policy cache, the identity key
//! composer, the atomic store evaluator, and the sliding-window counter
//! into a single `should_allow` call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::cache::PolicyCache;
use crate::collaborators::{AuditEntry, AuditSink, PolicyRepository};
use crate::decision::Decision;
use crate::error::{Result, ValidationError};
use crate::identity::{compose_key, Identity};
use crate::policy::Policy;
use crate::sliding_window::SlidingWindowCounter;
use crate::storage::Storage;
use crate::ticks::now_ticks;

/// A request to evaluate: which policy, who is asking, and how many tokens.
#[derive(Debug, Clone)]
pub struct RateLimitRequest {
    pub policy_name: String,
    pub identity: Identity,
    pub tokens: u64,
}

impl RateLimitRequest {
    pub fn new(policy_name: impl Into<String>, identity: Identity, tokens: u64) -> Self {
        Self {
            policy_name: policy_name.into(),
            identity,
            tokens,
        }
    }
}

/// Composes the cache, the atomic evaluator, and the sliding-window counter
/// into decisions. Owns no bucket state itself — that lives in the shared
/// [`Storage`] backend and in per-policy [`SlidingWindowCounter`]s created
/// lazily here.
pub struct DecisionCoordinator<S: Storage, R: PolicyRepository, A: AuditSink> {
    storage: S,
    cache: Arc<PolicyCache<R>>,
    audit: A,
    key_prefix: Option<String>,
    sliding_window: Duration,
    sliding_window_buckets: u32,
    counters: RwLock<HashMap<String, Arc<SlidingWindowCounter>>>,
}

impl<S: Storage, R: PolicyRepository, A: AuditSink> DecisionCoordinator<S, R, A> {
    pub fn new(
        storage: S,
        cache: Arc<PolicyCache<R>>,
        audit: A,
        key_prefix: Option<String>,
        sliding_window: Duration,
        sliding_window_buckets: u32,
    ) -> Self {
        Self {
            storage,
            cache,
            audit,
            key_prefix,
            sliding_window,
            sliding_window_buckets,
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate `request` against the resolved policy. `None` means the
    /// policy name is unknown and the caller should pass the request
    /// through unrestricted.
    pub async fn should_allow(&self, request: &RateLimitRequest) -> Result<Option<Decision>> {
        if request.tokens == 0 {
            return Err(ValidationError::ZeroTokensRequested.into());
        }

        let Some(policy) = self.cache.get_policy(&request.policy_name) else {
            return Ok(None);
        };
        policy
            .validate()
            .map_err(ValidationError::InvalidPolicy)?;

        let key = compose_key(self.key_prefix.as_deref(), policy.name(), &request.identity);
        let now = now_ticks();
        let requested_tokens = (policy.tokens_per_request() * request.tokens) as f64;
        let ttl = policy.window().max(Duration::from_secs(1));

        let outcome = match self.storage.evaluate(&key, &policy, now, requested_tokens, ttl).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(%error, policy = policy.name(), "atomic evaluator failed, failing open");
                fail_open(&policy)
            }
        };

        let sample = if policy.sliding_window_metrics_enabled() {
            let counter = self.counter_for(&policy);
            counter.add_sample(now, 1.0);
            Some(counter.snapshot(now))
        } else {
            None
        };

        let decision = Decision::from_outcome(outcome, now, sample);

        if !decision.is_allowed {
            self.report_deny(&policy, &key, &decision).await;
        }

        Ok(Some(decision))
    }

    async fn report_deny(&self, policy: &Policy, key: &str, decision: &Decision) {
        tracing::info!(
            policy = policy.name(),
            key,
            remaining = decision.counters.remaining,
            retry_after_ms = decision.retry_after.as_millis() as u64,
            "request denied"
        );

        let entry = AuditEntry {
            policy_name: policy.name().to_string(),
            identity_component: key.to_string(),
            allowed: false,
            limit: decision.counters.limit,
            remaining: decision.counters.remaining,
            retry_after_ms: decision.retry_after.as_millis() as u64,
            endpoint: None,
            timestamp_ticks: decision.evaluated_at_ticks,
        };

        if let Err(error) = self.audit.insert(entry).await {
            tracing::error!(%error, "audit sink failed to record deny event");
        }
    }

    fn counter_for(&self, policy: &Policy) -> Arc<SlidingWindowCounter> {
        if let Some(counter) = self.counters.read().get(policy.name()) {
            return Arc::clone(counter);
        }

        let mut counters = self.counters.write();
        counters
            .entry(policy.name().to_string())
            .or_insert_with(|| {
                Arc::new(
                    SlidingWindowCounter::new(self.sliding_window, self.sliding_window_buckets)
                        .expect("sliding window config is validated at startup"),
                )
            })
            .clone()
    }
}

/// Fail-open outcome: full remaining, nothing used, immediately retryable.
fn fail_open(policy: &Policy) -> crate::algorithm::EvalOutcome {
    crate::algorithm::EvalOutcome {
        allowed: true,
        limit: policy.permit_limit(),
        remaining: policy.burst_capacity() as f64,
        used: 0.0,
        retry_after_ticks: 0,
        reset_after_ticks: policy.precision_ticks(),
    }
}
