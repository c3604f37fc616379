//! Memoized actor context lookups.
//!
//! Expanding a user id into roles and groups costs two store queries.
//! [`CachedActorProvider`] keeps the result per user for a fixed TTL.
//! Callers that change role or group membership must `invalidate` the
//! affected user, or `clear` after bulk changes. A stale entry is removed
//! when its user is next looked up; `purge_expired` sweeps the rest.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use strata_core::error::StrataResult;
use strata_core::models::actor::ActorContext;
use strata_core::repository::ActorContextProvider;
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthzConfig;

pub struct CachedActorProvider<P: ActorContextProvider> {
    inner: P,
    ttl: Duration,
    entries: DashMap<Uuid, (ActorContext, Instant)>,
}

impl<P: ActorContextProvider> CachedActorProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn from_config(inner: P, config: &AuthzConfig) -> Self {
        Self::new(inner, Duration::from_secs(config.actor_cache_ttl_secs))
    }

    /// Drop the cached context for one user.
    pub fn invalidate(&self, user_id: Uuid) {
        self.entries.remove(&user_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Expired actor contexts purged");
        }
        purged
    }

    fn cached(&self, user_id: Uuid) -> Option<ActorContext> {
        {
            let entry = self.entries.get(&user_id)?;
            let (actor, stored_at) = entry.value();
            if stored_at.elapsed() < self.ttl {
                return Some(actor.clone());
            }
        }
        // The read guard must be released before removing.
        self.entries
            .remove_if(&user_id, |_, (_, stored_at)| stored_at.elapsed() >= self.ttl);
        None
    }
}

impl<P: ActorContextProvider> ActorContextProvider for CachedActorProvider<P> {
    async fn actor_context(&self, user_id: Uuid) -> StrataResult<ActorContext> {
        if let Some(actor) = self.cached(user_id) {
            debug!(%user_id, "Actor context cache hit");
            return Ok(actor);
        }

        // Errors (including unknown users) are not cached.
        let actor = self.inner.actor_context(user_id).await?;
        self.entries
            .insert(user_id, (actor.clone(), Instant::now()));
        Ok(actor)
    }
}
