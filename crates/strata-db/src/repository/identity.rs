//! SurrealDB identity store: users, roles, groups and their edges.
//!
//! Implements [`IdentityRepository`], the [`ActorContextProvider`] the
//! resolver uses to expand a user id, and the [`SubjectDirectory`]
//! administration validates subjects against.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use strata_core::error::StrataResult;
use strata_core::models::actor::ActorContext;
use strata_core::models::assignment::AssignmentSubject;
use strata_core::models::group::{CreateGroup, Group};
use strata_core::models::role::{CreateRole, Role};
use strata_core::models::user::{CreateUser, User};
use strata_core::repository::{ActorContextProvider, IdentityRepository, SubjectDirectory};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserRow {
    username: String,
    email: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Shared shape of `role` and `group` rows.
#[derive(Debug, SurrealValue)]
struct NamedRow {
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct NamedRowWithId {
    record_id: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the identity store.
#[derive(Clone)]
pub struct SurrealIdentityRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIdentityRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn create_named(
        &self,
        table: &'static str,
        name: String,
        description: String,
    ) -> Result<(Uuid, NamedRow), DbError> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record($table, $id) SET \
                 name = $name, description = $description",
            )
            .bind(("table", table))
            .bind(("id", id_str.clone()))
            .bind(("name", name))
            .bind(("description", description))
            .await?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<NamedRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: table.into(),
            id: id_str,
        })?;

        Ok((id, row))
    }

    async fn record_exists(&self, table: &'static str, id: String) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::record($table, $id) GROUP ALL")
            .bind(("table", table))
            .bind(("id", id))
            .await?;

        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn role_name_exists(&self, name: String) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM role WHERE name = $name GROUP ALL")
            .bind(("name", name))
            .await?;

        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }
}

impl<C: Connection> IdentityRepository for SurrealIdentityRepository<C> {
    async fn create_user(&self, input: CreateUser) -> StrataResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(User {
            id,
            username: row.username,
            email: row.email,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn create_role(&self, input: CreateRole) -> StrataResult<Role> {
        let (id, row) = self
            .create_named("role", input.name, input.description)
            .await?;

        Ok(Role {
            id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn create_group(&self, input: CreateGroup) -> StrataResult<Group> {
        let (id, row) = self
            .create_named("group", input.name, input.description)
            .await?;

        Ok(Group {
            id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn get_role_by_name(&self, name: &str) -> StrataResult<Option<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE name = $name LIMIT 1",
            )
            .bind(("name", name.to_owned()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<NamedRowWithId> = result.take(0).map_err(DbError::from)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let id = Uuid::parse_str(&row.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid role UUID: {e}")))?;

        Ok(Some(Role {
            id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> StrataResult<()> {
        let user_id_str = user_id.to_string();
        let role_id_str = role_id.to_string();

        // Drop any existing edge first so repeated assignment stays a
        // single edge.
        let query = format!(
            "BEGIN TRANSACTION; \
             DELETE has_role WHERE in = user:`{user_id_str}` AND out = role:`{role_id_str}`; \
             RELATE user:`{user_id_str}` -> has_role -> role:`{role_id_str}`; \
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> StrataResult<()> {
        self.db
            .query(
                "DELETE has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn add_member(&self, user_id: Uuid, group_id: Uuid) -> StrataResult<()> {
        let user_id_str = user_id.to_string();
        let group_id_str = group_id.to_string();

        let query = format!(
            "BEGIN TRANSACTION; \
             DELETE member_of WHERE in = user:`{user_id_str}` AND out = group:`{group_id_str}`; \
             RELATE user:`{user_id_str}` -> member_of -> group:`{group_id_str}`; \
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn remove_member(&self, user_id: Uuid, group_id: Uuid) -> StrataResult<()> {
        self.db
            .query(
                "DELETE member_of WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}

impl<C: Connection> ActorContextProvider for SurrealIdentityRepository<C> {
    async fn actor_context(&self, user_id: Uuid) -> StrataResult<ActorContext> {
        let user_id_str = user_id.to_string();

        if !self.record_exists("user", user_id_str.clone()).await? {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: user_id_str,
            }
            .into());
        }

        // Two queries: direct role names, then group ids.
        let mut result = self
            .db
            .query(
                "SELECT VALUE name FROM role \
                 WHERE id IN (\
                     SELECT VALUE out FROM has_role \
                     WHERE in = type::record('user', $user_id)\
                 ); \
                 SELECT VALUE meta::id(id) FROM group \
                 WHERE id IN (\
                     SELECT VALUE out FROM member_of \
                     WHERE in = type::record('user', $user_id)\
                 );",
            )
            .bind(("user_id", user_id_str))
            .await
            .map_err(DbError::from)?;

        let role_names: Vec<String> = result.take(0).map_err(DbError::from)?;
        let group_ids: Vec<String> = result.take(1).map_err(DbError::from)?;

        let group_ids = group_ids
            .iter()
            .map(|id| {
                Uuid::parse_str(id).map_err(|e| DbError::Corrupt(format!("invalid group UUID: {e}")))
            })
            .collect::<Result<BTreeSet<_>, DbError>>()?;

        Ok(ActorContext {
            user_id,
            role_names: role_names.into_iter().collect(),
            group_ids,
        })
    }
}

impl<C: Connection> SubjectDirectory for SurrealIdentityRepository<C> {
    async fn subject_exists(&self, subject: &AssignmentSubject) -> StrataResult<bool> {
        let exists = match subject {
            AssignmentSubject::Role { name } => self.role_name_exists(name.clone()).await?,
            AssignmentSubject::Group { id } => self.record_exists("group", id.to_string()).await?,
            AssignmentSubject::User { id }
            | AssignmentSubject::Model { user_id: id, .. }
            | AssignmentSubject::Object { user_id: id, .. } => {
                self.record_exists("user", id.to_string()).await?
            }
        };
        Ok(exists)
    }
}
