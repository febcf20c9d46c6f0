//! The result of a single rate-limit evaluation.

use std::time::Duration;

use crate::sliding_window::SlidingWindowSample;
use crate::ticks::ticks_to_duration;

/// Usage counters produced by a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Counters {
    pub limit: u64,
    pub remaining: f64,
    pub used: f64,
    pub reset_after: Duration,
}

/// The outcome of [`crate::coordinator::DecisionCoordinator::should_allow`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub is_allowed: bool,
    pub counters: Counters,
    /// Present only when the policy has `sliding_window_metrics_enabled`.
    pub sliding_window_sample: Option<SlidingWindowSample>,
    /// Zero iff `is_allowed`.
    pub retry_after: Duration,
    pub evaluated_at_ticks: i64,
}

impl Decision {
    pub fn from_outcome(
        outcome: crate::algorithm::EvalOutcome,
        now_ticks: i64,
        sliding_window_sample: Option<SlidingWindowSample>,
    ) -> Self {
        Self {
            is_allowed: outcome.allowed,
            counters: Counters {
                limit: outcome.limit,
                remaining: outcome.remaining,
                used: outcome.used,
                reset_after: ticks_to_duration(outcome.reset_after_ticks),
            },
            sliding_window_sample,
            retry_after: ticks_to_duration(outcome.retry_after_ticks),
            evaluated_at_ticks: now_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::EvalOutcome;

    fn outcome(allowed: bool) -> EvalOutcome {
        EvalOutcome {
            allowed,
            limit: 5,
            remaining: if allowed { 4.0 } else { 0.0 },
            used: if allowed { 1.0 } else { 0.0 },
            retry_after_ticks: if allowed { 0 } else { 1_000_000 },
            reset_after_ticks: 1_000_000,
        }
    }

    #[test]
    fn allowed_decision_has_zero_retry_after() {
        let decision = Decision::from_outcome(outcome(true), 1, None);
        assert!(decision.is_allowed);
        assert_eq!(decision.retry_after, Duration::ZERO);
    }

    #[test]
    fn denied_decision_carries_retry_after() {
        let decision = Decision::from_outcome(outcome(false), 1, None);
        assert!(!decision.is_allowed);
        assert!(decision.retry_after > Duration::ZERO);
    }
}
