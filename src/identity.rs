//! Caller identity and storage-key composition.
//!
//! Identity extraction from an inbound request is an external concern (the
//! HTTP front-end populates an [`Identity`]); this module only derives the
//! deterministic storage key a policy's bucket state lives under.

use std::fmt::Write as _;

/// Up to four optional components describing who is making the request.
///
/// Precedence when composing a key is `custom_discriminator > api_key >
/// user_id > ip_address > anonymous`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub api_key: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub custom_discriminator: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_custom_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.custom_discriminator = Some(discriminator.into());
        self
    }

    /// The most specific component and the key prefix it maps to, per the
    /// precedence chain. `None` means the anonymous bucket.
    fn most_specific(&self) -> Option<(&str, &str)> {
        if let Some(v) = self.custom_discriminator.as_deref().filter(|s| !s.is_empty()) {
            return Some(("", v));
        }
        if let Some(v) = self.api_key.as_deref().filter(|s| !s.is_empty()) {
            return Some(("api:", v));
        }
        if let Some(v) = self.user_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(("user:", v));
        }
        if let Some(v) = self.ip_address.as_deref().filter(|s| !s.is_empty()) {
            return Some(("ip:", v));
        }
        None
    }
}

/// Compose the deterministic storage key for `(policy_name, identity)`,
/// as `"{PolicyName}:{prefix}{component}"`, optionally prefixed with a
/// global namespace separated by `:`.
///
/// The result is a total, deterministic function of its inputs (testable
/// property #6) — the same identity always yields the same key, byte for
/// byte, and no normalisation (case-folding, trimming) is applied; callers
/// own sanitising untrusted identity bytes before they reach here.
pub fn compose_key(global_prefix: Option<&str>, policy_name: &str, identity: &Identity) -> String {
    let (prefix, component) = identity.most_specific().unwrap_or(("", "anon"));

    let mut key = String::with_capacity(
        global_prefix.map(str::len).unwrap_or(0) + policy_name.len() + prefix.len() + component.len() + 2,
    );
    if let Some(global) = global_prefix.filter(|p| !p.is_empty()) {
        key.push_str(global);
        key.push(':');
    }
    let _ = write!(key, "{policy_name}:{prefix}{component}");
    key
}
