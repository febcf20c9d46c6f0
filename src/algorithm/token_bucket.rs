//! Token Bucket evaluation.

use super::{BucketState, EvalOutcome};
use crate::policy::Policy;
use crate::ticks::ceil_div;

/// Evaluate a token bucket.
pub fn evaluate(
    state: Option<BucketState>,
    policy: &Policy,
    now_ticks: i64,
    requested_tokens: f64,
) -> (BucketState, EvalOutcome) {
    let burst_capacity = policy.burst_capacity() as f64;
    let refill_rate = policy.rate_per_tick();

    // Step 2: uninitialised key sees a full bucket.
    let (mut tokens, last_refill_ticks) = match state {
        Some(s) if s.last_update_ticks != 0 => (s.primary, s.last_update_ticks),
        _ => (burst_capacity, now_ticks),
    };

    // Step 3: retrograde clocks never roll the bucket backwards.
    let elapsed = (now_ticks - last_refill_ticks).max(0);
    // Step 4.
    if elapsed > 0 {
        tokens = (tokens + elapsed as f64 * refill_rate).min(burst_capacity);
    }

    // Step 5.
    let requested = requested_tokens.min(burst_capacity);
    let allowed = tokens >= requested;

    let (used, retry_after_ticks) = if allowed {
        tokens -= requested;
        (requested, 0)
    } else {
        // Step 6.
        let shortage = requested - tokens;
        let ticks_until = ceil_div(shortage, refill_rate).max(policy.precision_ticks());
        let mut retry_after = ticks_until.min(policy.window_ticks());
        if let Some(cooldown) = policy.cooldown_ticks() {
            retry_after = retry_after.max(cooldown);
        }
        (0.0, retry_after)
    };

    // Step 7: refill is a function of time, not of admission.
    let new_state = BucketState {
        primary: tokens,
        last_update_ticks: now_ticks,
    };

    // Step 8.
    let ticks_to_full = ceil_div((burst_capacity - tokens).max(0.0), refill_rate);
    let reset_lo = policy.precision_ticks();
    let reset_hi = policy.window_ticks().max(reset_lo);
    let reset_after_ticks = ticks_to_full.clamp(reset_lo, reset_hi);

    let outcome = EvalOutcome {
        allowed,
        limit: policy.permit_limit(),
        remaining: tokens.max(0.0),
        used,
        retry_after_ticks,
        reset_after_ticks,
    };

    (new_state, outcome)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::policy::{Algorithm, PolicyBuilder};
    use proptest::prelude::*;
    use std::time::Duration;

    fn arb_policy() -> impl Strategy<Value = Policy> {
        (1u64..1_000, 1u64..3_600).prop_map(|(permit_limit, window_secs)| {
            PolicyBuilder::new("prop", Algorithm::TokenBucket, permit_limit, Duration::from_secs(window_secs))
                .build()
                .unwrap()
        })
    }

    /// A sequence of (elapsed ticks before this call, tokens requested).
    fn arb_ops() -> impl Strategy<Value = Vec<(i64, f64)>> {
        prop::collection::vec((0i64..10_000_000, 0.0f64..2_000.0), 1..30)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Across any sequence of calls, tokens never exceed burst capacity,
        /// remaining and used always sum to it, and a denial always respects
        /// the policy's precision floor.
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

        /// Refilling never requires more than one window to return to full
        /// from empty.
        #[test]
        fn refills_to_full_within_one_window(policy in arb_policy()) {
            let drained = BucketState { primary: 0.0, last_update_ticks: 1 };
            let later = 1 + policy.window_ticks();
            let (new_state, _) = evaluate(Some(drained), &policy, later, 0.0);
            prop_assert!((new_state.primary - policy.burst_capacity() as f64).abs() < 1e-6);
        }
    }
}
