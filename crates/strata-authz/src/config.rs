//! Authorization configuration.

use serde::{Deserialize, Serialize};

/// What `revoke` does to an assignment row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RevokePolicy {
    /// Write `is_granted = false`: an explicit deny that blocks grants
    /// found at other levels.
    #[default]
    SoftDeny,
    /// Delete the row: the level falls back to "no assignment".
    HardDelete,
}

/// Configuration for the authorization layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Create a missing permission on `grant` instead of failing
    /// (default: false, permissions must be registered first).
    pub auto_create_permissions: bool,
    pub revoke_policy: RevokePolicy,
    /// Lifetime of memoized actor contexts in seconds (default: 60).
    pub actor_cache_ttl_secs: u64,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            auto_create_permissions: false,
            revoke_policy: RevokePolicy::SoftDeny,
            actor_cache_ttl_secs: 60,
        }
    }
}
