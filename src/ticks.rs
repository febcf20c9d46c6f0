//! Tick arithmetic shared by the algorithms, the atomic evaluator, and the
//! sliding-window counter.
//!
//! A tick is a fixed-resolution signed 64-bit count, matching the reference
//! numeric type chosen for the decision engine: 100 nanoseconds per tick, the
//! same resolution the original distributed implementation uses. Any
//! consistent unit would satisfy the algorithms, which only ever compare and
//! subtract ticks directly; 100ns is kept here so a caller feeding wall-clock
//! time sees the same granularity the design assumes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Ticks per second, fixed at 100ns resolution.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Current wall-clock time expressed in ticks since the Unix epoch.
///
/// Production callers use this; tests supply `nowTicks` directly for
/// determinism, per the design's clock-source note.
pub fn now_ticks() -> i64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    duration_to_ticks(elapsed)
}

/// Convert a [`Duration`] to ticks, saturating at `i64::MAX`.
pub fn duration_to_ticks(d: Duration) -> i64 {
    let nanos = d.as_nanos();
    let ticks = nanos / 100;
    i64::try_from(ticks).unwrap_or(i64::MAX)
}

/// Convert a tick count back to a [`Duration`], clamping negative ticks to zero.
pub fn ticks_to_duration(ticks: i64) -> Duration {
    let ticks = ticks.max(0) as u64;
    Duration::from_nanos(ticks.saturating_mul(100))
}

/// Ceiling division for non-negative tick arithmetic: `ceil(numerator / denominator)`.
///
/// `denominator` must be strictly positive.
pub fn ceil_div(numerator: f64, denominator: f64) -> i64 {
    debug_assert!(denominator > 0.0);
    (numerator / denominator).ceil() as i64
}
