//! Layered grant/deny resolution.
//!
//! A check gathers the role, group and user assignments for one
//! permission and applies a deny-wins rule across all three sets
//! before any grant is honoured:
//!
//! 1. Unknown or inactive permission: deny.
//! 2. Any role deny, else any group deny, else a user deny: deny.
//! 3. Any role grant, else any group grant, else a user grant: grant.
//! 4. Otherwise: deny.
//!
//! Model and object assignments refine an already-granted base check.
//! They never grant on their own; a missing refinement row keeps the
//! base grant and an explicit refinement deny revokes it.
//!
//! A user-level assignment past `expires_at` is treated as absent.
//! Role and group rows are not subject to expiry: their denies block
//! unconditionally. The boolean entry points fail closed: store errors
//! are logged and resolve to deny.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use strata_core::error::StrataResult;
use strata_core::models::actor::ActorContext;
use strata_core::models::assignment::{Assignment, AssignmentLevel};
use strata_core::models::permission::PermissionName;
use strata_core::repository::{ActorContextProvider, AssignmentRepository, PermissionRepository};
use tracing::{debug, warn};
use uuid::Uuid;

/// Why a check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No permission is registered for `(resource, action)`.
    UnknownPermission,
    InactivePermission,
    /// An assignment at `level` explicitly denies.
    ExplicitDeny { level: AssignmentLevel },
    /// No applicable assignment grants.
    NoGrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted { level: AssignmentLevel },
    Denied { reason: DenyReason },
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    fn denied(reason: DenyReason) -> Self {
        Self::Denied { reason }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted { level } => write!(f, "granted ({level})"),
            Self::Denied { reason } => match reason {
                DenyReason::UnknownPermission => f.write_str("denied (unknown permission)"),
                DenyReason::InactivePermission => f.write_str("denied (inactive permission)"),
                DenyReason::ExplicitDeny { level } => write!(f, "denied (explicit deny at {level})"),
                DenyReason::NoGrant => f.write_str("denied (no grant)"),
            },
        }
    }
}

/// Apply the deny-wins rule to the collected assignment sets.
///
/// Only the user row is checked for expiry.
pub fn decide(
    roles: &[Assignment],
    groups: &[Assignment],
    user: Option<&Assignment>,
    now: DateTime<Utc>,
) -> Decision {
    let user = user.filter(|a| a.is_effective_at(now));

    if roles.iter().any(|a| !a.is_granted) {
        return Decision::denied(DenyReason::ExplicitDeny {
            level: AssignmentLevel::Role,
        });
    }
    if groups.iter().any(|a| !a.is_granted) {
        return Decision::denied(DenyReason::ExplicitDeny {
            level: AssignmentLevel::Group,
        });
    }
    if user.is_some_and(|a| !a.is_granted) {
        return Decision::denied(DenyReason::ExplicitDeny {
            level: AssignmentLevel::User,
        });
    }

    if roles.iter().any(|a| a.is_granted) {
        return Decision::Granted {
            level: AssignmentLevel::Role,
        };
    }
    if groups.iter().any(|a| a.is_granted) {
        return Decision::Granted {
            level: AssignmentLevel::Group,
        };
    }
    if user.is_some_and(|a| a.is_granted) {
        return Decision::Granted {
            level: AssignmentLevel::User,
        };
    }

    Decision::denied(DenyReason::NoGrant)
}

/// Narrow a base decision with a model- or object-level row.
pub fn refine(
    base: Decision,
    refinement: Option<&Assignment>,
    now: DateTime<Utc>,
) -> Decision {
    if !base.is_granted() {
        return base;
    }
    match refinement.filter(|a| a.is_effective_at(now)) {
        None => base,
        Some(row) if row.is_granted => Decision::Granted { level: row.level() },
        Some(row) => Decision::denied(DenyReason::ExplicitDeny { level: row.level() }),
    }
}

/// Base decision plus the permission it was made for.
struct Resolution {
    decision: Decision,
    permission_id: Option<Uuid>,
}

/// Evaluates permission checks against a permission store.
///
/// Stateless between calls; safe to share across tasks.
#[derive(Clone)]
pub struct PermissionResolver<P: PermissionRepository, A: AssignmentRepository> {
    permissions: P,
    assignments: A,
}

impl<P: PermissionRepository, A: AssignmentRepository> PermissionResolver<P, A> {
    pub fn new(permissions: P, assignments: A) -> Self {
        Self {
            permissions,
            assignments,
        }
    }

    async fn resolve(
        &self,
        actor: &ActorContext,
        resource: &str,
        action: &str,
    ) -> StrataResult<Resolution> {
        let Some(permission) = self.permissions.find_by_name(resource, action).await? else {
            return Ok(Resolution {
                decision: Decision::denied(DenyReason::UnknownPermission),
                permission_id: None,
            });
        };
        if !permission.is_active {
            return Ok(Resolution {
                decision: Decision::denied(DenyReason::InactivePermission),
                permission_id: Some(permission.id),
            });
        }

        let role_names: Vec<String> = actor.role_names.iter().cloned().collect();
        let group_ids: Vec<Uuid> = actor.group_ids.iter().copied().collect();

        let roles = self
            .assignments
            .list_role_assignments(permission.id, &role_names)
            .await?;
        let groups = self
            .assignments
            .list_group_assignments(permission.id, &group_ids)
            .await?;
        let user = self
            .assignments
            .find_user_assignment(permission.id, actor.user_id)
            .await?;

        let now = Utc::now();
        if user.as_ref().is_some_and(|a| a.is_expired_at(now)) {
            debug!(user_id = %actor.user_id, resource, action, "Ignoring expired user assignment");
        }

        Ok(Resolution {
            decision: decide(&roles, &groups, user.as_ref(), now),
            permission_id: Some(permission.id),
        })
    }

    /// Evaluate `(resource, action)` for `actor`, propagating store errors.
    pub async fn evaluate(
        &self,
        actor: &ActorContext,
        resource: &str,
        action: &str,
    ) -> StrataResult<Decision> {
        let decision = self.resolve(actor, resource, action).await?.decision;
        debug!(user_id = %actor.user_id, resource, action, ?decision, "Permission evaluated");
        Ok(decision)
    }

    /// Evaluate the base permission, then the model-type refinement.
    pub async fn evaluate_model(
        &self,
        actor: &ActorContext,
        resource: &str,
        action: &str,
        model_type: &str,
    ) -> StrataResult<Decision> {
        let base = self.resolve(actor, resource, action).await?;
        let Some(permission_id) = base.permission_id.filter(|_| base.decision.is_granted()) else {
            return Ok(base.decision);
        };

        let row = self
            .assignments
            .find_model_assignment(permission_id, actor.user_id, model_type)
            .await?;
        let decision = refine(base.decision, row.as_ref(), Utc::now());
        debug!(user_id = %actor.user_id, resource, action, model_type, ?decision, "Model permission evaluated");
        Ok(decision)
    }

    /// Evaluate the base permission, then the object-instance refinement.
    pub async fn evaluate_object(
        &self,
        actor: &ActorContext,
        resource: &str,
        action: &str,
        object_id: &str,
        object_type: &str,
    ) -> StrataResult<Decision> {
        let base = self.resolve(actor, resource, action).await?;
        let Some(permission_id) = base.permission_id.filter(|_| base.decision.is_granted()) else {
            return Ok(base.decision);
        };

        let row = self
            .assignments
            .find_object_assignment(permission_id, actor.user_id, object_id, object_type)
            .await?;
        let decision = refine(base.decision, row.as_ref(), Utc::now());
        debug!(
            user_id = %actor.user_id,
            resource,
            action,
            object_id,
            object_type,
            ?decision,
            "Object permission evaluated"
        );
        Ok(decision)
    }

    pub async fn has_permission(&self, actor: &ActorContext, resource: &str, action: &str) -> bool {
        fail_closed(self.evaluate(actor, resource, action).await, actor, resource, action)
    }

    pub async fn has_model_permission(
        &self,
        actor: &ActorContext,
        resource: &str,
        action: &str,
        model_type: &str,
    ) -> bool {
        fail_closed(
            self.evaluate_model(actor, resource, action, model_type).await,
            actor,
            resource,
            action,
        )
    }

    pub async fn has_object_permission(
        &self,
        actor: &ActorContext,
        resource: &str,
        action: &str,
        object_id: &str,
        object_type: &str,
    ) -> bool {
        fail_closed(
            self.evaluate_object(actor, resource, action, object_id, object_type)
                .await,
            actor,
            resource,
            action,
        )
    }

    /// Check each `Resource.Action` name independently.
    ///
    /// Malformed names map to `false`.
    pub async fn has_any_of<S: AsRef<str>>(
        &self,
        actor: &ActorContext,
        names: &[S],
    ) -> HashMap<String, bool> {
        let mut results = HashMap::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let granted = match name.parse::<PermissionName>() {
                Ok(parsed) => {
                    self.has_permission(actor, &parsed.resource, &parsed.action)
                        .await
                }
                Err(e) => {
                    warn!(user_id = %actor.user_id, name, error = %e, "Skipping malformed permission name");
                    false
                }
            };
            results.insert(name.to_owned(), granted);
        }
        results
    }

    /// Expand `user_id` through `provider`, then check.
    ///
    /// Unknown users and provider failures deny.
    pub async fn has_permission_for_user<Pr: ActorContextProvider>(
        &self,
        provider: &Pr,
        user_id: Uuid,
        resource: &str,
        action: &str,
    ) -> bool {
        match provider.actor_context(user_id).await {
            Ok(actor) => self.has_permission(&actor, resource, action).await,
            Err(e) => {
                warn!(%user_id, resource, action, error = %e, "Actor lookup failed, denying");
                false
            }
        }
    }
}

fn fail_closed(
    result: StrataResult<Decision>,
    actor: &ActorContext,
    resource: &str,
    action: &str,
) -> bool {
    match result {
        Ok(decision) => decision.is_granted(),
        Err(e) => {
            warn!(user_id = %actor.user_id, resource, action, error = %e, "Permission check failed, denying");
            false
        }
    }
}
