//! Permission administration: registration, grant and revoke.
//!
//! Subject and permission lookups that come back empty are reported as
//! an [`AdminOutcome`], not an error. Store failures propagate.

use chrono::{DateTime, Utc};
use strata_core::error::{StrataError, StrataResult};
use strata_core::models::assignment::{Assignment, AssignmentSubject, UpsertAssignment};
use strata_core::models::permission::{
    CreatePermission, Permission, PermissionScope, UpdatePermission,
};
use strata_core::repository::{AssignmentRepository, PermissionRepository, SubjectDirectory};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AuthzConfig, RevokePolicy};

/// A grant (or explicit deny) to apply.
#[derive(Debug, Clone)]
pub struct GrantInput {
    pub subject: AssignmentSubject,
    pub resource: String,
    pub action: String,
    pub is_granted: bool,
    /// Defaults to the subject level's priority.
    pub priority: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl GrantInput {
    pub fn allow(
        subject: AssignmentSubject,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            resource: resource.into(),
            action: action.into(),
            is_granted: true,
            priority: None,
            expires_at: None,
        }
    }

    pub fn deny(
        subject: AssignmentSubject,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            is_granted: false,
            ..Self::allow(subject, resource, action)
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminOutcome {
    /// The assignment row as written.
    Applied(Assignment),
    /// The row was deleted (or was already absent).
    Removed,
    SubjectNotFound,
    PermissionNotFound,
}

impl AdminOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied(_) | Self::Removed)
    }
}

pub struct PermissionAdmin<P, A, D>
where
    P: PermissionRepository,
    A: AssignmentRepository,
    D: SubjectDirectory,
{
    permissions: P,
    assignments: A,
    directory: D,
    config: AuthzConfig,
}

impl<P, A, D> PermissionAdmin<P, A, D>
where
    P: PermissionRepository,
    A: AssignmentRepository,
    D: SubjectDirectory,
{
    pub fn new(permissions: P, assignments: A, directory: D, config: AuthzConfig) -> Self {
        Self {
            permissions,
            assignments,
            directory,
            config,
        }
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// Register a new permission. Fails with `Conflict` if
    /// `resource.action` is already registered.
    pub async fn register_permission(&self, input: CreatePermission) -> StrataResult<Permission> {
        validate_name(&input.resource, &input.action)?;

        if self
            .permissions
            .find_by_name(&input.resource, &input.action)
            .await?
            .is_some()
        {
            return Err(StrataError::Conflict {
                entity: format!("permission {}.{}", input.resource, input.action),
            });
        }

        let permission = self.permissions.create(input).await?;
        info!(permission = %permission.name(), scope = permission.scope.as_str(), "Permission registered");
        Ok(permission)
    }

    /// Mark a permission inactive. Every check against it then denies.
    pub async fn deactivate_permission(
        &self,
        resource: &str,
        action: &str,
    ) -> StrataResult<Permission> {
        let permission = self
            .permissions
            .find_by_name(resource, action)
            .await?
            .ok_or_else(|| StrataError::not_found("permission", format!("{resource}.{action}")))?;

        let updated = self
            .permissions
            .update(
                permission.id,
                UpdatePermission {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?;
        info!(permission = %updated.name(), "Permission deactivated");
        Ok(updated)
    }

    /// Insert or update the assignment for `(subject, permission)`.
    pub async fn grant(&self, input: GrantInput) -> StrataResult<AdminOutcome> {
        if !self.directory.subject_exists(&input.subject).await? {
            warn!(subject = ?input.subject, "Grant rejected: subject not found");
            return Ok(AdminOutcome::SubjectNotFound);
        }

        let permission = match self
            .permissions
            .find_by_name(&input.resource, &input.action)
            .await?
        {
            Some(permission) => permission,
            None if self.config.auto_create_permissions => {
                self.register_permission(CreatePermission {
                    resource: input.resource.clone(),
                    action: input.action.clone(),
                    description: String::new(),
                    scope: scope_for(&input.subject),
                })
                .await?
            }
            None => {
                warn!(resource = %input.resource, action = %input.action, "Grant rejected: permission not registered");
                return Ok(AdminOutcome::PermissionNotFound);
            }
        };

        let level = input.subject.level();
        let assignment = self
            .assignments
            .upsert(UpsertAssignment {
                permission_id: permission.id,
                priority: input
                    .priority
                    .unwrap_or_else(|| level.default_priority()),
                subject: input.subject,
                is_granted: input.is_granted,
                expires_at: input.expires_at,
            })
            .await?;

        info!(
            permission = %permission.name(),
            level = %level,
            subject_id = %assignment.subject.subject_id(),
            is_granted = assignment.is_granted,
            "Assignment applied"
        );
        Ok(AdminOutcome::Applied(assignment))
    }

    /// Revoke `resource.action` from `subject` according to the
    /// configured [`RevokePolicy`].
    ///
    /// A soft revoke keeps the priority of the row it replaces and clears
    /// any expiry, so the deny is permanent.
    pub async fn revoke(
        &self,
        subject: AssignmentSubject,
        resource: &str,
        action: &str,
    ) -> StrataResult<AdminOutcome> {
        if !self.directory.subject_exists(&subject).await? {
            warn!(?subject, "Revoke rejected: subject not found");
            return Ok(AdminOutcome::SubjectNotFound);
        }

        let Some(permission) = self.permissions.find_by_name(resource, action).await? else {
            warn!(resource, action, "Revoke rejected: permission not registered");
            return Ok(AdminOutcome::PermissionNotFound);
        };

        match self.config.revoke_policy {
            RevokePolicy::SoftDeny => {
                let level = subject.level();
                let priority = self
                    .existing_assignment(permission.id, &subject)
                    .await?
                    .map_or_else(|| level.default_priority(), |row| row.priority);
                let assignment = self
                    .assignments
                    .upsert(UpsertAssignment {
                        permission_id: permission.id,
                        subject,
                        is_granted: false,
                        priority,
                        expires_at: None,
                    })
                    .await?;
                info!(
                    permission = %permission.name(),
                    level = %level,
                    subject_id = %assignment.subject.subject_id(),
                    "Assignment revoked as explicit deny"
                );
                Ok(AdminOutcome::Applied(assignment))
            }
            RevokePolicy::HardDelete => {
                let existed = self.assignments.delete(permission.id, &subject).await?;
                info!(
                    permission = %permission.name(),
                    level = %subject.level(),
                    subject_id = %subject.subject_id(),
                    existed,
                    "Assignment deleted"
                );
                Ok(AdminOutcome::Removed)
            }
        }
    }

    async fn existing_assignment(
        &self,
        permission_id: Uuid,
        subject: &AssignmentSubject,
    ) -> StrataResult<Option<Assignment>> {
        match subject {
            AssignmentSubject::Role { name } => Ok(self
                .assignments
                .list_role_assignments(permission_id, std::slice::from_ref(name))
                .await?
                .into_iter()
                .next()),
            AssignmentSubject::Group { id } => Ok(self
                .assignments
                .list_group_assignments(permission_id, std::slice::from_ref(id))
                .await?
                .into_iter()
                .next()),
            AssignmentSubject::User { id } => {
                self.assignments
                    .find_user_assignment(permission_id, *id)
                    .await
            }
            AssignmentSubject::Model {
                user_id,
                model_type,
            } => {
                self.assignments
                    .find_model_assignment(permission_id, *user_id, model_type)
                    .await
            }
            AssignmentSubject::Object {
                user_id,
                object_id,
                object_type,
            } => {
                self.assignments
                    .find_object_assignment(permission_id, *user_id, object_id, object_type)
                    .await
            }
        }
    }
}

/// Resource names cannot contain `.`; it separates resource from action.
fn validate_name(resource: &str, action: &str) -> StrataResult<()> {
    if resource.is_empty() || action.is_empty() {
        return Err(StrataError::Validation {
            message: "resource and action must be non-empty".into(),
        });
    }
    if resource.contains('.') {
        return Err(StrataError::Validation {
            message: format!("resource must not contain '.': {resource}"),
        });
    }
    Ok(())
}

fn scope_for(subject: &AssignmentSubject) -> PermissionScope {
    match subject {
        AssignmentSubject::Model { .. } => PermissionScope::Model,
        AssignmentSubject::Object { .. } => PermissionScope::Object,
        _ => PermissionScope::Global,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_input_builders() {
        let subject = AssignmentSubject::User { id: Uuid::new_v4() };
        let input = GrantInput::deny(subject.clone(), "Doc", "Read").with_priority(5);
        assert!(!input.is_granted);
        assert_eq!(input.priority, Some(5));
        assert_eq!(input.subject, subject);
        assert!(GrantInput::allow(subject, "Doc", "Read").is_granted);
    }

    #[test]
    fn names_are_validated() {
        assert!(validate_name("Doc", "Read").is_ok());
        assert!(validate_name("Doc", "Read.All").is_ok());
        assert!(validate_name("", "Read").is_err());
        assert!(validate_name("Doc", "").is_err());
        assert!(validate_name("Doc.Sub", "Read").is_err());
    }

    #[test]
    fn outcome_success() {
        assert!(AdminOutcome::Removed.is_success());
        assert!(!AdminOutcome::SubjectNotFound.is_success());
        assert!(!AdminOutcome::PermissionNotFound.is_success());
    }
}
