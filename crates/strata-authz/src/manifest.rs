//! Declarative permission catalogue and role seed data.
//!
//! A manifest lists the permissions an application defines and the
//! roles that should hold them. `bootstrap` adds whatever the store is
//! missing. Rows that already exist are left alone, so a deny or revoke
//! written by an administrator survives a re-run.
//!
//! ```json
//! {
//!   "permissions": [
//!     { "resource": "Document", "action": "Read", "scope": "Object" }
//!   ],
//!   "roles": [
//!     { "name": "Reader", "grants": ["Document.Read"] }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strata_core::error::{StrataError, StrataResult};
use strata_core::models::assignment::{AssignmentLevel, AssignmentSubject, UpsertAssignment};
use strata_core::models::permission::{CreatePermission, PermissionName, PermissionScope};
use strata_core::models::role::CreateRole;
use strata_core::repository::{AssignmentRepository, IdentityRepository, PermissionRepository};
use tracing::{debug, info};

use crate::error::AuthzError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestPermission {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scope: PermissionScope,
    /// Priority of role grants for this permission. Defaults to the
    /// role level's priority.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl ManifestPermission {
    fn name(&self) -> PermissionName {
        PermissionName::new(&self.resource, &self.action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub grants: Vec<PermissionName>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PermissionManifest {
    #[serde(default)]
    pub permissions: Vec<ManifestPermission>,
    #[serde(default)]
    pub roles: Vec<ManifestRole>,
}

/// What a bootstrap run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub permissions_created: u64,
    pub permissions_existing: u64,
    pub roles_created: u64,
    pub grants_applied: u64,
    /// Role grants left untouched because a row already existed.
    pub grants_skipped: u64,
}

impl PermissionManifest {
    /// Parse and validate a JSON manifest.
    pub fn from_json(json: &str) -> Result<Self, AuthzError> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| AuthzError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        let mut seen = HashSet::new();
        for permission in &self.permissions {
            if permission.resource.is_empty()
                || permission.action.is_empty()
                || permission.resource.contains('.')
            {
                return Err(AuthzError::InvalidPermissionName(format!(
                    "{}.{}",
                    permission.resource, permission.action
                )));
            }
            if !seen.insert(permission.name()) {
                return Err(AuthzError::InvalidManifest(format!(
                    "permission {} declared twice",
                    permission.name()
                )));
            }
        }

        let mut roles = HashSet::new();
        for role in &self.roles {
            if role.name.is_empty() {
                return Err(AuthzError::InvalidManifest("role name is empty".into()));
            }
            if !roles.insert(role.name.as_str()) {
                return Err(AuthzError::InvalidManifest(format!(
                    "role {} declared twice",
                    role.name
                )));
            }
        }
        Ok(())
    }

    /// Register missing permissions, create missing roles, and create
    /// role grants that have no assignment row yet.
    ///
    /// Grants may name permissions registered outside the manifest;
    /// a grant naming an unknown permission fails with `NotFound`.
    pub async fn bootstrap<P, A, I>(
        &self,
        permissions: &P,
        assignments: &A,
        identity: &I,
    ) -> StrataResult<BootstrapReport>
    where
        P: PermissionRepository,
        A: AssignmentRepository,
        I: IdentityRepository,
    {
        self.validate().map_err(StrataError::from)?;

        let mut report = BootstrapReport::default();
        let priorities: HashMap<PermissionName, i32> = self
            .permissions
            .iter()
            .filter_map(|p| p.priority.map(|priority| (p.name(), priority)))
            .collect();

        for entry in &self.permissions {
            if permissions
                .find_by_name(&entry.resource, &entry.action)
                .await?
                .is_some()
            {
                report.permissions_existing += 1;
                continue;
            }
            permissions
                .create(CreatePermission {
                    resource: entry.resource.clone(),
                    action: entry.action.clone(),
                    description: entry.description.clone(),
                    scope: entry.scope,
                })
                .await?;
            info!(permission = %entry.name(), "Manifest permission registered");
            report.permissions_created += 1;
        }

        for role in &self.roles {
            if identity.get_role_by_name(&role.name).await?.is_none() {
                identity
                    .create_role(CreateRole {
                        name: role.name.clone(),
                        description: role.description.clone(),
                    })
                    .await?;
                info!(role = %role.name, "Manifest role created");
                report.roles_created += 1;
            }

            for grant in &role.grants {
                let permission = permissions
                    .find_by_name(&grant.resource, &grant.action)
                    .await?
                    .ok_or_else(|| StrataError::not_found("permission", grant))?;

                let existing = assignments
                    .list_role_assignments(permission.id, std::slice::from_ref(&role.name))
                    .await?;
                if !existing.is_empty() {
                    debug!(
                        role = %role.name,
                        permission = %grant,
                        "Role assignment exists, skipping"
                    );
                    report.grants_skipped += 1;
                    continue;
                }

                assignments
                    .upsert(UpsertAssignment {
                        permission_id: permission.id,
                        subject: AssignmentSubject::Role {
                            name: role.name.clone(),
                        },
                        is_granted: true,
                        priority: priorities
                            .get(grant)
                            .copied()
                            .unwrap_or_else(|| AssignmentLevel::Role.default_priority()),
                        expires_at: None,
                    })
                    .await?;
                report.grants_applied += 1;
            }
        }

        info!(
            permissions_created = report.permissions_created,
            roles_created = report.roles_created,
            grants_applied = report.grants_applied,
            grants_skipped = report.grants_skipped,
            "Manifest bootstrap complete"
        );
        Ok(report)
    }
}
