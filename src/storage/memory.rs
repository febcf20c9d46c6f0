//! In-process storage backed by `DashMap`.
//!
//! Eviction follows each key's own TTL rather than one global maximum age: a
//! policy with a ten-minute window keeps its dormant keys evicted ten times
//! later than a policy with a one-second window, the same deadline the Redis
//! backend sets with `EXPIRE`. A background sweep still has to exist here —
//! unlike Redis, nothing reclaims an expired entry on its own — but it only
//! decides *when* to look, not *which* keys survive; that is decided per key
//! from the TTL passed into [`Storage::evaluate`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::algorithm::{self, BucketState, EvalOutcome};
use crate::error::StorageError;
use crate::policy::Policy;
use crate::storage::Storage;
use crate::ticks::{duration_to_ticks, now_ticks};

/// A bucket's state plus the tick at which it becomes eligible for sweeping.
#[derive(Debug, Clone, Copy)]
struct Entry {
    state: BucketState,
    expires_at_ticks: i64,
}

/// When the background sweep looks for expired keys.
#[derive(Debug, Clone)]
pub enum GcInterval {
    /// Sweep every N calls to `evaluate`.
    Requests(u64),
    /// Sweep at a fixed wall-clock interval, via a spawned background task.
    Duration(Duration),
    /// Never sweep automatically; only [`MemoryStorage::run_gc`] reclaims keys.
    Manual,
}

impl Default for GcInterval {
    fn default() -> Self {
        Self::Requests(10_000)
    }
}

/// Garbage-collection scheduling.
#[derive(Debug, Clone, Default)]
pub struct GcConfig {
    pub interval: GcInterval,
}

impl GcConfig {
    pub fn on_requests(count: u64) -> Self {
        Self {
            interval: GcInterval::Requests(count),
        }
    }

    pub fn on_duration(interval: Duration) -> Self {
        Self {
            interval: GcInterval::Duration(interval),
        }
    }

    pub fn manual() -> Self {
        Self {
            interval: GcInterval::Manual,
        }
    }
}

/// In-memory [`Storage`] backend.
///
/// Each key's [`BucketState`] lives directly in the map; `DashMap::entry`
/// gives the same read-modify-write atomicity a Redis script gives the
/// distributed backend, without needing a separate lock.
pub struct MemoryStorage {
    data: DashMap<String, Entry>,
    gc_config: GcConfig,
    request_count: AtomicU64,
    gc_lock: Mutex<()>,
    shutdown: Arc<Notify>,
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.data.len())
            .field("gc_config", &self.gc_config)
            .finish()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_gc(GcConfig::default())
    }

    pub fn with_gc(gc_config: GcConfig) -> Self {
        let storage = Self {
            data: DashMap::new(),
            gc_config: gc_config.clone(),
            request_count: AtomicU64::new(0),
            gc_lock: Mutex::new(()),
            shutdown: Arc::new(Notify::new()),
        };

        if let GcInterval::Duration(interval) = gc_config.interval {
            storage.start_gc_task(interval);
        }

        storage
    }

    fn start_gc_task(&self, interval: Duration) {
        let data = self.data.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        sweep_expired(&data);
                    }
                    _ = shutdown.notified() => break,
                }
            }
        });
    }

    /// Manually sweep every key past its own TTL deadline.
    pub async fn run_gc(&self) {
        sweep_expired(&self.data);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    fn maybe_run_gc(&self) {
        if let GcInterval::Requests(threshold) = self.gc_config.interval {
            let count = self.request_count.fetch_add(1, Ordering::Relaxed);
            if threshold > 0 && count % threshold == 0 && count > 0 {
                if let Some(_guard) = self.gc_lock.try_lock() {
                    sweep_expired(&self.data);
                }
            }
        }
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

fn sweep_expired(data: &DashMap<String, Entry>) {
    let now = now_ticks();
    data.retain(|_, entry| entry.expires_at_ticks > now);
}

impl Storage for MemoryStorage {
    async fn evaluate(
        &self,
        key: &str,
        policy: &Policy,
        now_ticks: i64,
        requested_tokens: f64,
        ttl: Duration,
    ) -> Result<EvalOutcome, StorageError> {
        self.maybe_run_gc();

        let expires_at_ticks = now_ticks.saturating_add(duration_to_ticks(ttl));

        let mut outcome: Option<EvalOutcome> = None;
        self.data
            .entry(key.to_string())
            .and_modify(|entry| {
                let (new_state, o) =
                    algorithm::evaluate(Some(entry.state), policy, now_ticks, requested_tokens);
                entry.state = new_state;
                entry.expires_at_ticks = expires_at_ticks;
                outcome = Some(o);
            })
            .or_insert_with(|| {
                let (new_state, o) = algorithm::evaluate(None, policy, now_ticks, requested_tokens);
                outcome = Some(o);
                Entry {
                    state: new_state,
                    expires_at_ticks,
                }
            });

        Ok(outcome.expect("entry() always runs exactly one of and_modify/or_insert_with"))
    }

    async fn reset(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }
}
