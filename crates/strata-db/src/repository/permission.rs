//! SurrealDB implementation of [`PermissionRepository`].

use chrono::{DateTime, Utc};
use strata_core::error::StrataResult;
use strata_core::models::permission::{
    CreatePermission, Permission, PermissionScope, UpdatePermission,
};
use strata_core::repository::{PaginatedResult, Pagination, PermissionRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct PermissionRow {
    resource: String,
    action: String,
    description: String,
    scope: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRow {
    fn into_permission(self, id: Uuid) -> Result<Permission, DbError> {
        let scope: PermissionScope = self
            .scope
            .parse()
            .map_err(|e| DbError::Corrupt(format!("permission scope: {e}")))?;
        Ok(Permission {
            id,
            resource: self.resource,
            action: self.action,
            description: self.description,
            scope,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct PermissionRowWithId {
    record_id: String,
    resource: String,
    action: String,
    description: String,
    scope: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRowWithId {
    fn try_into_permission(self) -> Result<Permission, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid permission UUID: {e}")))?;
        PermissionRow {
            resource: self.resource,
            action: self.action,
            description: self.description,
            scope: self.scope,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_permission(id)
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> StrataResult<Permission> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('permission', $id) SET \
                 resource = $resource, action = $action, \
                 description = $description, scope = $scope",
            )
            .bind(("id", id_str.clone()))
            .bind(("resource", input.resource))
            .bind(("action", input.action))
            .bind(("description", input.description))
            .bind(("scope", input.scope.as_str()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;

        Ok(row.into_permission(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> StrataResult<Permission> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('permission', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;

        Ok(row.into_permission(id)?)
    }

    async fn find_by_name(&self, resource: &str, action: &str) -> StrataResult<Option<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE resource = $resource AND action = $action \
                 LIMIT 1",
            )
            .bind(("resource", resource.to_owned()))
            .bind(("action", action.to_owned()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        let permission = rows
            .into_iter()
            .next()
            .map(PermissionRowWithId::try_into_permission)
            .transpose()?;

        Ok(permission)
    }

    async fn update(&self, id: Uuid, input: UpdatePermission) -> StrataResult<Permission> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.scope.is_some() {
            sets.push("scope = $scope");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        // UPDATE never creates; a missing record yields no rows.
        let query = format!(
            "UPDATE type::record('permission', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(scope) = input.scope {
            builder = builder.bind(("scope", scope.as_str()));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;

        Ok(row.into_permission(id)?)
    }

    async fn list(&self, pagination: Pagination) -> StrataResult<PaginatedResult<Permission>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM permission GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 ORDER BY resource ASC, action ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_permission())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn import(&self, rows: Vec<Permission>) -> StrataResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut statements = vec!["BEGIN TRANSACTION;".to_owned()];
        for i in 0..rows.len() {
            statements.push(format!(
                "UPSERT type::record('permission', $id_{i}) SET \
                 resource = $resource_{i}, action = $action_{i}, \
                 description = $description_{i}, scope = $scope_{i}, \
                 is_active = $is_active_{i}, created_at = $created_at_{i}, \
                 updated_at = $updated_at_{i};"
            ));
        }
        statements.push("COMMIT TRANSACTION;".to_owned());
        let query = statements.join("\n");

        let count = rows.len() as u64;
        let mut builder = self.db.query(&query);
        for (i, row) in rows.into_iter().enumerate() {
            builder = builder
                .bind((format!("id_{i}"), row.id.to_string()))
                .bind((format!("resource_{i}"), row.resource))
                .bind((format!("action_{i}"), row.action))
                .bind((format!("description_{i}"), row.description))
                .bind((format!("scope_{i}"), row.scope.as_str()))
                .bind((format!("is_active_{i}"), row.is_active))
                .bind((format!("created_at_{i}"), row.created_at))
                .bind((format!("updated_at_{i}"), row.updated_at));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(format!("permission import rolled back: {e}")))?;

        Ok(count)
    }
}
