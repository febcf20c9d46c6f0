//! Benchmarks for the pure bucket algorithms and the end-to-end decision path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ratequota_core::algorithm::{self, BucketState};
use ratequota_core::{Algorithm, Policy};
use std::time::Duration;

fn token_bucket_policy() -> Policy {
    Policy::new("bench-token", Algorithm::TokenBucket, 1000, Duration::from_secs(1)).unwrap()
}

fn leaky_bucket_policy() -> Policy {
    Policy::new("bench-leaky", Algorithm::LeakyBucket, 1000, Duration::from_secs(1)).unwrap()
}

fn bench_pure_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("algorithms");

    group.bench_function("token_bucket_eval", |b| {
        let policy = token_bucket_policy();
        let mut state = None;
        let mut tick = 0i64;
        b.iter(|| {
            tick += 1_000;
            let (next, outcome) = algorithm::evaluate(state, &policy, tick, 1.0);
            state = Some(next);
            black_box(outcome)
        })
    });

    group.bench_function("leaky_bucket_eval", |b| {
        let policy = leaky_bucket_policy();
        let mut state = None;
        let mut tick = 0i64;
        b.iter(|| {
            tick += 1_000;
            let (next, outcome) = algorithm::evaluate(state, &policy, tick, 1.0);
            state = Some(next);
            black_box(outcome)
        })
    });

    group.finish();
}

fn bench_cold_vs_warm(c: &mut Criterion) {
    let mut group = c.benchmark_group("algorithm_state");
    let policy = token_bucket_policy();

    group.bench_function("uninitialized_key", |b| {
        b.iter(|| black_box(algorithm::evaluate(None, &policy, 1, 1.0)))
    });

    group.bench_with_input(
        BenchmarkId::new("warm_key", "after_500_requests"),
        &500,
        |b, &n| {
            let mut state = None;
            for i in 0..n {
                let (next, _) = algorithm::evaluate(state, &policy, i, 1.0);
                state = Some(next);
            }
            let warm: BucketState = state.unwrap();
            b.iter(|| black_box(algorithm::evaluate(Some(warm), &policy, n, 1.0)))
        },
    );

    group.finish();
}

criterion_group!(benches, bench_pure_algorithms, bench_cold_vs_warm);
criterion_main!(benches);
