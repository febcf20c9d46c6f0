//! Policy Cache: an immutable, atomically-swapped snapshot of
//! `PolicyName → Policy`, refreshed from static configuration merged with a
//! [`PolicyRepository`].
//!
//! Grounded in the refresh/merge/invalidate shape of the corpus's own
//! policy cache, but the snapshot itself is published through [`ArcSwap`]
//! instead of a `tokio::sync::RwLock` so `get_policy` never blocks a
//! reader behind a writer, and concurrent refresh triggers are coalesced
//! with a non-blocking flag instead of queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;

use crate::collaborators::PolicyRepository;
use crate::policy::Policy;

/// An immutable mapping from lower-cased policy name to policy.
pub type PolicySnapshot = Arc<HashMap<String, Policy>>;

/// In-memory cache of policy definitions.
pub struct PolicyCache<R: PolicyRepository> {
    repository: Arc<R>,
    configured: Vec<Policy>,
    snapshot: ArcSwap<HashMap<String, Policy>>,
    refreshing: AtomicBool,
    reload_interval: Duration,
    shutdown: Notify,
}

impl<R: PolicyRepository> PolicyCache<R> {
    pub fn new(repository: Arc<R>, configured: Vec<Policy>, reload_interval: Duration) -> Self {
        Self {
            repository,
            configured,
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            refreshing: AtomicBool::new(false),
            reload_interval,
            shutdown: Notify::new(),
        }
    }

    /// Run the initial refresh per the configured startup rule, then start the
    /// reload timer (if enabled). Must be called on an `Arc<Self>` since
    /// the lazy path and the timer both spawn background work that
    /// outlives this call.
    pub async fn initialize(self: &Arc<Self>, warm_on_startup: bool) {
        if warm_on_startup {
            self.refresh().await;
        } else {
            let cache = Arc::clone(self);
            tokio::spawn(async move { cache.refresh().await });
        }
        self.start_reload_timer();
    }

    fn start_reload_timer(self: &Arc<Self>) {
        if self.reload_interval.is_zero() {
            return;
        }
        let cache = Arc::clone(self);
        let interval = self.reload_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = ticker.tick() => cache.refresh().await,
                    _ = cache.shutdown.notified() => break,
                }
            }
        });
    }

    /// Stop the reload timer. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Call after an observed configuration change.
    pub async fn notify_config_change(&self) {
        self.refresh().await;
    }

    /// Merge configured and repository policies into a fresh snapshot and
    /// publish it atomically. A refresh already in flight makes this a
    /// no-op (coalesced, never queued).
    pub async fn refresh(&self) {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return;
        }

        match self.repository.get_policies().await {
            Ok(repository_policies) => {
                let mut map = HashMap::with_capacity(self.configured.len() + repository_policies.len());
                for policy in &self.configured {
                    insert_if_valid(&mut map, policy.clone());
                }
                for policy in repository_policies {
                    insert_if_valid(&mut map, policy);
                }
                let count = map.len();
                self.snapshot.store(Arc::new(map));
                tracing::info!(policies = count, "policy cache refreshed");
            }
            Err(error) => {
                tracing::error!(%error, "policy repository fetch failed, retaining previous snapshot");
            }
        }

        self.refreshing.store(false, Ordering::Release);
    }

    /// O(1), non-blocking lookup by name (case-insensitive).
    pub fn get_policy(&self, name: &str) -> Option<Policy> {
        self.snapshot.load().get(&name.to_lowercase()).cloned()
    }

    /// The current immutable mapping.
    pub fn snapshot_policies(&self) -> PolicySnapshot {
        self.snapshot.load_full()
    }
}

fn insert_if_valid(map: &mut HashMap<String, Policy>, policy: Policy) {
    match policy.validate() {
        Ok(()) => {
            map.insert(policy.name().to_lowercase(), policy);
        }
        Err(error) => {
            tracing::warn!(policy = policy.name(), %error, "skipping invalid policy entry");
        }
    }
}
