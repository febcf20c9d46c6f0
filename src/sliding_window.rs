//! Sliding-Window Counter: a lock-free, wait-free-in-steady-state
//! striped ring buffer producing `(hits, rate)` observability samples.
//!
//! This is unrelated to the sliding-window *enforcement* style some rate
//! limiters use — it never admits or denies a request, it only counts ones
//! already decided elsewhere. Grounded in the compare-exchange retry loop
//! a production token-bucket limiter in the reference pack uses to update
//! its atomic fields without a lock, combined with the bucket-indexing
//! arithmetic a sliding-window counter implementation elsewhere in the pack
//! uses (mutex-protected there; made lock-free here via per-field CAS).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::ConfigError;
use crate::ticks::{ticks_to_duration, TICKS_PER_SECOND};

/// A single bucket's observed hit count over `[BucketStartTicks, BucketStartTicks + BucketDurationTicks)`.
#[derive(Debug)]
struct Bucket {
    start_ticks: AtomicI64,
    value_bits: AtomicU64,
}

impl Bucket {
    fn new() -> Self {
        Self {
            // Sentinel older than any real tick, so an untouched bucket never
            // contributes to a snapshot.
            start_ticks: AtomicI64::new(i64::MIN),
            value_bits: AtomicU64::new(0f64.to_bits()),
        }
    }
}

/// A sample taken from a [`SlidingWindowCounter`] at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingWindowSample {
    pub window: Duration,
    pub hits: f64,
    pub rate_per_second: f64,
}

/// Lock-free striped ring buffer of `B` buckets spanning window `W`.
#[derive(Debug)]
pub struct SlidingWindowCounter {
    buckets: Vec<Bucket>,
    window_ticks: i64,
    bucket_duration_ticks: i64,
}

impl SlidingWindowCounter {
    /// `buckets` must be greater than 1; `window` must be positive.
    pub fn new(window: Duration, buckets: u32) -> Result<Self, ConfigError> {
        if buckets <= 1 {
            return Err(ConfigError::InvalidSlidingWindowBucketCount { count: buckets });
        }
        let window_ticks = crate::ticks::duration_to_ticks(window);
        let bucket_duration_ticks = (window_ticks / buckets as i64).max(1);

        Ok(Self {
            buckets: (0..buckets).map(|_| Bucket::new()).collect(),
            window_ticks,
            bucket_duration_ticks,
        })
    }

    fn bucket_start(&self, t: i64) -> i64 {
        t - t.rem_euclid(self.bucket_duration_ticks)
    }

    fn bucket_index(&self, t: i64) -> usize {
        (t.div_euclid(self.bucket_duration_ticks)).rem_euclid(self.buckets.len() as i64) as usize
    }

    /// Record `v` hits at tick `t`. If `t` lands in a bucket whose stored
    /// start has rolled past, the bucket is atomically reset before the
    /// value is added.
    pub fn add_sample(&self, t: i64, v: f64) {
        let start = self.bucket_start(t);
        let bucket = &self.buckets[self.bucket_index(t)];

        loop {
            let current_start = bucket.start_ticks.load(Ordering::Acquire);
            if current_start == start {
                break;
            }
            if bucket
                .start_ticks
                .compare_exchange(current_start, start, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                bucket.value_bits.store(0f64.to_bits(), Ordering::Release);
                break;
            }
            // Lost the race to another writer rolling the same bucket; retry
            // and let its result settle.
        }

        loop {
            let bits = bucket.value_bits.load(Ordering::Acquire);
            let updated = f64::from_bits(bits) + v;
            if bucket
                .value_bits
                .compare_exchange_weak(bits, updated.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
    }

    /// Sum every bucket whose start falls within `[t - window, t]`.
    pub fn snapshot(&self, t: i64) -> SlidingWindowSample {
        let cutoff = t - self.window_ticks;
        let hits: f64 = self
            .buckets
            .iter()
            .filter(|b| b.start_ticks.load(Ordering::Acquire) >= cutoff)
            .map(|b| f64::from_bits(b.value_bits.load(Ordering::Acquire)))
            .sum();

        let window_seconds = self.window_ticks as f64 / TICKS_PER_SECOND as f64;
        let rate_per_second = if window_seconds > 0.0 { hits / window_seconds } else { 0.0 };

        SlidingWindowSample {
            window: ticks_to_duration(self.window_ticks),
            hits,
            rate_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_and_rate_match_samples_added_in_the_current_window() {
        let counter = SlidingWindowCounter::new(Duration::from_secs(10), 5).unwrap();
        let t = 100 * TICKS_PER_SECOND;
        for _ in 0..5 {
            counter.add_sample(t, 1.0);
        }
        let sample = counter.snapshot(t);
        assert_eq!(sample.hits, 5.0);
        assert!((sample.rate_per_second - 0.5).abs() < 1e-9);
    }

    #[test]
    fn stale_buckets_are_excluded_from_a_later_snapshot() {
        let counter = SlidingWindowCounter::new(Duration::from_secs(5), 5).unwrap();
        for _ in 0..3 {
            counter.add_sample(0, 1.0);
        }
        let sample = counter.snapshot(10 * TICKS_PER_SECOND);
        assert_eq!(sample.hits, 0.0);
        assert_eq!(sample.rate_per_second, 0.0);
    }

    #[test]
    fn hits_are_monotonic_within_one_window() {
        let counter = SlidingWindowCounter::new(Duration::from_secs(10), 5).unwrap();
        let t = 50 * TICKS_PER_SECOND;
        let mut last = 0.0;
        for _ in 0..10 {
            counter.add_sample(t, 1.0);
            let sample = counter.snapshot(t);
            assert!(sample.hits >= last);
            last = sample.hits;
        }
    }

    #[test]
    fn rejects_non_positive_bucket_counts() {
        assert_eq!(
            SlidingWindowCounter::new(Duration::from_secs(5), 1).unwrap_err(),
            ConfigError::InvalidSlidingWindowBucketCount { count: 1 }
        );
    }
}
