//! External interfaces the decision engine consumes but does not
//! implement: the policy repository behind the cache, and the audit sink
//! the coordinator reports denies to. Both are best-effort collaborators —
//! their errors are logged and contained, never surfaced to `ShouldAllow`.

use std::future::Future;

use crate::error::{AuditError, RepositoryError};
use crate::policy::Policy;

/// Source of persisted policy definitions backing the [`crate::cache::PolicyCache`].
pub trait PolicyRepository: Send + Sync + 'static {
    /// Fetch every currently-active policy.
    fn get_policies(&self) -> impl Future<Output = Result<Vec<Policy>, RepositoryError>> + Send;

    /// Persist a policy, inserting or replacing by name.
    fn upsert_policy(&self, policy: Policy) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// A deny event recorded for audit purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub policy_name: String,
    pub identity_component: String,
    pub allowed: bool,
    pub limit: u64,
    pub remaining: f64,
    pub retry_after_ms: u64,
    pub endpoint: Option<String>,
    pub timestamp_ticks: i64,
}

/// Best-effort sink the coordinator reports deny events to.
pub trait AuditSink: Send + Sync + 'static {
    fn insert(&self, entry: AuditEntry) -> impl Future<Output = Result<(), AuditError>> + Send;
}

/// An audit sink that discards every entry. The default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    async fn insert(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Ok(())
    }
}

/// A policy repository with no persisted policies. Useful when every policy
/// comes from static configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyPolicyRepository;

impl PolicyRepository for EmptyPolicyRepository {
    async fn get_policies(&self) -> Result<Vec<Policy>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn upsert_policy(&self, _policy: Policy) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_repository_reports_no_policies() {
        let repo = EmptyPolicyRepository;
        assert!(repo.get_policies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn null_sink_accepts_every_entry() {
        let sink = NullAuditSink;
        let entry = AuditEntry {
            policy_name: "api".into(),
            identity_component: "anon".into(),
            allowed: false,
            limit: 5,
            remaining: 0.0,
            retry_after_ms: 100,
            endpoint: None,
            timestamp_ticks: 1,
        };
        assert!(sink.insert(entry).await.is_ok());
    }
}
