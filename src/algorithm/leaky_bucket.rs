//! Leaky Bucket evaluation, symmetric to [`super::token_bucket`].

use super::{BucketState, EvalOutcome};
use crate::policy::Policy;
use crate::ticks::ceil_div;

/// Evaluate a leaky bucket.
pub fn evaluate(
    state: Option<BucketState>,
    policy: &Policy,
    now_ticks: i64,
    requested_tokens: f64,
) -> (BucketState, EvalOutcome) {
    let burst_capacity = policy.burst_capacity() as f64;
    let leak_rate = policy.rate_per_tick();

    // Step 2.
    let (mut water_level, last_drip_ticks) = match state {
        Some(s) if s.last_update_ticks != 0 => (s.primary, s.last_update_ticks),
        _ => (0.0, now_ticks),
    };

    // Step 3.
    let elapsed = (now_ticks - last_drip_ticks).max(0);
    water_level = (water_level - elapsed as f64 * leak_rate).max(0.0);

    // Step 4.
    let requested = requested_tokens.min(burst_capacity);
    let allowed = water_level + requested <= burst_capacity;

    let (used, retry_after_ticks) = if allowed {
        water_level += requested;
        (requested, 0)
    } else {
        // Step 5.
        let overflow = water_level + requested - burst_capacity;
        let ticks_until = ceil_div(overflow, leak_rate).max(policy.precision_ticks());
        let mut retry_after = ticks_until.min(policy.window_ticks());
        if let Some(cooldown) = policy.cooldown_ticks() {
            retry_after = retry_after.max(cooldown);
        }
        (0.0, retry_after)
    };

    let new_state = BucketState {
        primary: water_level,
        last_update_ticks: now_ticks,
    };

    // Step 6.
    let ticks_to_empty = ceil_div(water_level, leak_rate);
    let reset_lo = policy.precision_ticks();
    let reset_hi = policy.window_ticks().max(reset_lo);
    let reset_after_ticks = ticks_to_empty.clamp(reset_lo, reset_hi);

    let outcome = EvalOutcome {
        allowed,
        limit: policy.permit_limit(),
        remaining: (burst_capacity - water_level).max(0.0),
        used,
        retry_after_ticks,
        reset_after_ticks,
    };

    (new_state, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Algorithm, PolicyBuilder};
    use crate::ticks::TICKS_PER_SECOND;
    use std::time::Duration;

    fn policy() -> Policy {
        PolicyBuilder::new("api", Algorithm::LeakyBucket, 3, Duration::from_secs(1))
            .build()
            .unwrap()
    }

    #[test]
    fn drain_then_deny_then_allow_again_after_leaking() {
        let p = policy();
        let mut state = None;
        for i in 0..3 {
            let (new_state, outcome) = evaluate(state, &p, 1, 1.0);
            assert!(outcome.allowed, "request {i} should be allowed");
            state = Some(new_state);
        }
        let (_, outcome) = evaluate(state, &p, 1, 1.0);
        assert!(!outcome.allowed);

        let later = 1_001 * (TICKS_PER_SECOND / 1000);
        let (_, outcome) = evaluate(state, &p, later, 1.0);
        assert!(outcome.allowed);
    }

    #[test]
    fn water_level_never_exceeds_burst_capacity() {
        let p = policy();
        let full = BucketState {
            primary: p.burst_capacity() as f64,
            last_update_ticks: 1,
        };
        let (new_state, _) = evaluate(Some(full), &p, 1, 1.0);
        assert!(new_state.primary <= p.burst_capacity() as f64 + 1e-9);
    }

    #[test]
    fn remaining_plus_used_equals_burst_capacity() {
        let p = policy();
        let (_, outcome) = evaluate(None, &p, 1, 1.0);
        assert!((outcome.remaining + outcome.used - p.burst_capacity() as f64).abs() < 1e-9);
    }

    #[test]
    fn denied_evaluation_respects_precision_floor() {
        let p = policy();
        let full = BucketState {
            primary: p.burst_capacity() as f64,
            last_update_ticks: 1,
        };
        let (_, outcome) = evaluate(Some(full), &p, 1, 1.0);
        assert!(!outcome.allowed);
        assert!(outcome.retry_after_ticks >= p.precision_ticks());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::policy::{Algorithm, PolicyBuilder};
    use proptest::prelude::*;
    use std::time::Duration;

    fn arb_policy() -> impl Strategy<Value = Policy> {
        (1u64..1_000, 1u64..3_600).prop_map(|(permit_limit, window_secs)| {
            PolicyBuilder::new("prop", Algorithm::LeakyBucket, permit_limit, Duration::from_secs(window_secs))
                .build()
                .unwrap()
        })
    }

    fn arb_ops() -> impl Strategy<Value = Vec<(i64, f64)>> {
        prop::collection::vec((0i64..10_000_000, 0.0f64..2_000.0), 1..30)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Across any sequence of calls, the water level never exceeds burst
        /// capacity or goes negative, remaining and used always sum to
        /// capacity, and a denial always respects the precision floor.
        #[test]
        fn invariants_hold_across_a_call_sequence(policy in arb_policy(), ops in arb_ops()) {
            let mut state = None;
            let mut now = 1i64;
            for (elapsed, requested) in ops {
                now += elapsed;
                let (new_state, outcome) = evaluate(state, &policy, now, requested);

                prop_assert!(new_state.primary <= policy.burst_capacity() as f64 + 1e-6);
                prop_assert!(new_state.primary >= -1e-9);
                prop_assert!(
                    (outcome.remaining + outcome.used - policy.burst_capacity() as f64).abs() < 1e-6
                );
                if !outcome.allowed {
                    prop_assert!(outcome.retry_after_ticks >= policy.precision_ticks());
                    prop_assert_eq!(outcome.used, 0.0);
                } else {
                    prop_assert_eq!(outcome.retry_after_ticks, 0);
                }

                state = Some(new_state);
            }
        }

        /// `evaluate` is a pure function of its arguments: replaying the same
        /// state at the same tick always yields the same outcome.
        #[test]
        fn same_inputs_produce_the_same_outcome(
            policy in arb_policy(),
            requested in 0.0f64..2_000.0,
        ) {
            let (state_a, outcome_a) = evaluate(None, &policy, 1, requested);
            let (state_b, outcome_b) = evaluate(None, &policy, 1, requested);
            prop_assert_eq!(state_a, state_b);
            prop_assert_eq!(outcome_a, outcome_b);
        }

        /// Draining never takes more than one window to fully empty a full
        /// bucket.
        #[test]
        fn drains_to_empty_within_one_window(policy in arb_policy()) {
            let full = BucketState {
                primary: policy.burst_capacity() as f64,
                last_update_ticks: 1,
            };
            let later = 1 + policy.window_ticks();
            let (new_state, _) = evaluate(Some(full), &policy, later, 0.0);
            prop_assert!(new_state.primary.abs() < 1e-6);
        }
    }
}
