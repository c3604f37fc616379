//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. The resolver depends only on
//! [`PermissionRepository::find_by_name`] and the read half of
//! [`AssignmentRepository`]; administration adds the write half.

use uuid::Uuid;

use crate::error::StrataResult;
use crate::models::{
    actor::ActorContext,
    assignment::{Assignment, AssignmentSubject, UpsertAssignment},
    group::{CreateGroup, Group},
    permission::{CreatePermission, Permission, UpdatePermission},
    role::{CreateRole, Role},
    user::{CreateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    /// Pagination for the page after this one, if any rows remain.
    pub fn next_page(&self) -> Option<Pagination> {
        let next = self.offset + self.items.len() as u64;
        (!self.items.is_empty() && next < self.total).then_some(Pagination {
            offset: next,
            limit: self.limit,
        })
    }
}

// ---------------------------------------------------------------------------
// Permissions & assignments
// ---------------------------------------------------------------------------

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = StrataResult<Permission>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = StrataResult<Permission>> + Send;
    /// Exact, case-sensitive lookup. Inactive permissions are returned
    /// too; callers decide what inactivity means.
    fn find_by_name(
        &self,
        resource: &str,
        action: &str,
    ) -> impl Future<Output = StrataResult<Option<Permission>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdatePermission,
    ) -> impl Future<Output = StrataResult<Permission>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = StrataResult<PaginatedResult<Permission>>> + Send;
    /// Write the given rows verbatim (ids included) in one transaction.
    /// Either every row is written or none is.
    fn import(&self, rows: Vec<Permission>) -> impl Future<Output = StrataResult<u64>> + Send;
}

pub trait AssignmentRepository: Send + Sync {
    /// Role-level rows for `permission_id` whose role is in `role_names`.
    fn list_role_assignments(
        &self,
        permission_id: Uuid,
        role_names: &[String],
    ) -> impl Future<Output = StrataResult<Vec<Assignment>>> + Send;

    /// Group-level rows for `permission_id` whose group is in `group_ids`.
    fn list_group_assignments(
        &self,
        permission_id: Uuid,
        group_ids: &[Uuid],
    ) -> impl Future<Output = StrataResult<Vec<Assignment>>> + Send;

    fn find_user_assignment(
        &self,
        permission_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = StrataResult<Option<Assignment>>> + Send;

    fn find_model_assignment(
        &self,
        permission_id: Uuid,
        user_id: Uuid,
        model_type: &str,
    ) -> impl Future<Output = StrataResult<Option<Assignment>>> + Send;

    fn find_object_assignment(
        &self,
        permission_id: Uuid,
        user_id: Uuid,
        object_id: &str,
        object_type: &str,
    ) -> impl Future<Output = StrataResult<Option<Assignment>>> + Send;

    /// Insert or update the single row for `(subject, permission)`.
    /// Runs as one atomic statement.
    fn upsert(
        &self,
        input: UpsertAssignment,
    ) -> impl Future<Output = StrataResult<Assignment>> + Send;

    /// Remove the row for `(subject, permission)`. Returns whether a row
    /// existed.
    fn delete(
        &self,
        permission_id: Uuid,
        subject: &AssignmentSubject,
    ) -> impl Future<Output = StrataResult<bool>> + Send;

    fn list_by_permission(
        &self,
        permission_id: Uuid,
    ) -> impl Future<Output = StrataResult<Vec<Assignment>>> + Send;

    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = StrataResult<PaginatedResult<Assignment>>> + Send;

    /// Write the given rows verbatim in one transaction.
    fn import(&self, rows: Vec<Assignment>) -> impl Future<Output = StrataResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Translates a user id into the roles and groups it currently holds.
pub trait ActorContextProvider: Send + Sync {
    /// Fails with `NotFound` when the user does not exist.
    fn actor_context(&self, user_id: Uuid)
    -> impl Future<Output = StrataResult<ActorContext>> + Send;
}

/// Answers whether the subject of an assignment exists.
pub trait SubjectDirectory: Send + Sync {
    fn subject_exists(
        &self,
        subject: &AssignmentSubject,
    ) -> impl Future<Output = StrataResult<bool>> + Send;
}

pub trait IdentityRepository: Send + Sync {
    fn create_user(&self, input: CreateUser) -> impl Future<Output = StrataResult<User>> + Send;
    fn create_role(&self, input: CreateRole) -> impl Future<Output = StrataResult<Role>> + Send;
    fn create_group(&self, input: CreateGroup)
    -> impl Future<Output = StrataResult<Group>> + Send;
    fn get_role_by_name(&self, name: &str)
    -> impl Future<Output = StrataResult<Option<Role>>> + Send;

    /// Give a user a role (creates a `has_role` edge).
    fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = StrataResult<()>> + Send;
    fn unassign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = StrataResult<()>> + Send;

    /// Add a user to a group (creates a `member_of` edge).
    fn add_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = StrataResult<()>> + Send;
    fn remove_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = StrataResult<()>> + Send;
}
