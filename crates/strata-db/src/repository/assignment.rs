//! SurrealDB implementation of [`AssignmentRepository`].
//!
//! Every level lives in the `permission_assignment` table. The record
//! id is [`AssignmentSubject::record_id`], so upserts on the same
//! `(subject, permission)` key are idempotent.

use chrono::{DateTime, Utc};
use strata_core::error::StrataResult;
use strata_core::models::assignment::{
    Assignment, AssignmentLevel, AssignmentSubject, UpsertAssignment,
};
use strata_core::repository::{AssignmentRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

const SELECT_WITH_ID: &str = "SELECT meta::id(id) AS record_id, * FROM permission_assignment";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AssignmentRow {
    level: String,
    subject_id: String,
    permission_id: String,
    model_type: Option<String>,
    object_id: Option<String>,
    object_type: Option<String>,
    is_granted: bool,
    priority: i64,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AssignmentRowWithId {
    record_id: String,
    level: String,
    subject_id: String,
    permission_id: String,
    model_type: Option<String>,
    object_id: Option<String>,
    object_type: Option<String>,
    is_granted: bool,
    priority: i64,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Corrupt(format!("invalid {what} UUID: {e}")))
}

fn required(value: Option<String>, field: &str) -> Result<String, DbError> {
    value.ok_or_else(|| DbError::Corrupt(format!("assignment is missing {field}")))
}

impl AssignmentRow {
    fn into_assignment(self, id: Uuid) -> Result<Assignment, DbError> {
        let level: AssignmentLevel = self
            .level
            .parse()
            .map_err(|e| DbError::Corrupt(format!("assignment level: {e}")))?;

        let subject = match level {
            AssignmentLevel::Role => AssignmentSubject::Role {
                name: self.subject_id,
            },
            AssignmentLevel::Group => AssignmentSubject::Group {
                id: parse_uuid(&self.subject_id, "group")?,
            },
            AssignmentLevel::User => AssignmentSubject::User {
                id: parse_uuid(&self.subject_id, "user")?,
            },
            AssignmentLevel::Model => AssignmentSubject::Model {
                user_id: parse_uuid(&self.subject_id, "user")?,
                model_type: required(self.model_type, "model_type")?,
            },
            AssignmentLevel::Object => AssignmentSubject::Object {
                user_id: parse_uuid(&self.subject_id, "user")?,
                object_id: required(self.object_id, "object_id")?,
                object_type: required(self.object_type, "object_type")?,
            },
        };

        let priority = i32::try_from(self.priority)
            .map_err(|e| DbError::Corrupt(format!("assignment priority: {e}")))?;

        Ok(Assignment {
            id,
            permission_id: parse_uuid(&self.permission_id, "permission")?,
            subject,
            is_granted: self.is_granted,
            priority,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl AssignmentRowWithId {
    fn try_into_assignment(self) -> Result<Assignment, DbError> {
        let id = parse_uuid(&self.record_id, "assignment")?;
        AssignmentRow {
            level: self.level,
            subject_id: self.subject_id,
            permission_id: self.permission_id,
            model_type: self.model_type,
            object_id: self.object_id,
            object_type: self.object_type,
            is_granted: self.is_granted,
            priority: self.priority,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_assignment(id)
    }
}

fn collect_rows(rows: Vec<AssignmentRowWithId>) -> Result<Vec<Assignment>, DbError> {
    rows.into_iter()
        .map(AssignmentRowWithId::try_into_assignment)
        .collect()
}

/// Level-specific key columns: `(model_type, object_id, object_type)`.
fn refinement_columns(
    subject: &AssignmentSubject,
) -> (Option<String>, Option<String>, Option<String>) {
    match subject {
        AssignmentSubject::Model { model_type, .. } => (Some(model_type.clone()), None, None),
        AssignmentSubject::Object {
            object_id,
            object_type,
            ..
        } => (None, Some(object_id.clone()), Some(object_type.clone())),
        _ => (None, None, None),
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Assignment repository.
#[derive(Clone)]
pub struct SurrealAssignmentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAssignmentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_record(&self, record_id: Uuid) -> Result<Option<Assignment>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('permission_assignment', $id)")
            .bind(("id", record_id.to_string()))
            .await?;

        let rows: Vec<AssignmentRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_assignment(record_id))
            .transpose()
    }
}

impl<C: Connection> AssignmentRepository for SurrealAssignmentRepository<C> {
    async fn list_role_assignments(
        &self,
        permission_id: Uuid,
        role_names: &[String],
    ) -> StrataResult<Vec<Assignment>> {
        if role_names.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "{SELECT_WITH_ID} WHERE permission_id = $permission_id \
             AND level = 'Role' AND subject_id IN $subjects"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("permission_id", permission_id.to_string()))
            .bind(("subjects", role_names.to_vec()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssignmentRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(collect_rows(rows)?)
    }

    async fn list_group_assignments(
        &self,
        permission_id: Uuid,
        group_ids: &[Uuid],
    ) -> StrataResult<Vec<Assignment>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let subjects: Vec<String> = group_ids.iter().map(Uuid::to_string).collect();
        let query = format!(
            "{SELECT_WITH_ID} WHERE permission_id = $permission_id \
             AND level = 'Group' AND subject_id IN $subjects"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("permission_id", permission_id.to_string()))
            .bind(("subjects", subjects))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssignmentRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(collect_rows(rows)?)
    }

    async fn find_user_assignment(
        &self,
        permission_id: Uuid,
        user_id: Uuid,
    ) -> StrataResult<Option<Assignment>> {
        let subject = AssignmentSubject::User { id: user_id };
        Ok(self.find_by_record(subject.record_id(permission_id)).await?)
    }

    async fn find_model_assignment(
        &self,
        permission_id: Uuid,
        user_id: Uuid,
        model_type: &str,
    ) -> StrataResult<Option<Assignment>> {
        let subject = AssignmentSubject::Model {
            user_id,
            model_type: model_type.to_owned(),
        };
        Ok(self.find_by_record(subject.record_id(permission_id)).await?)
    }

    async fn find_object_assignment(
        &self,
        permission_id: Uuid,
        user_id: Uuid,
        object_id: &str,
        object_type: &str,
    ) -> StrataResult<Option<Assignment>> {
        let subject = AssignmentSubject::Object {
            user_id,
            object_id: object_id.to_owned(),
            object_type: object_type.to_owned(),
        };
        Ok(self.find_by_record(subject.record_id(permission_id)).await?)
    }

    async fn upsert(&self, input: UpsertAssignment) -> StrataResult<Assignment> {
        let id = input.subject.record_id(input.permission_id);
        let id_str = id.to_string();
        let (model_type, object_id, object_type) = refinement_columns(&input.subject);

        // Single statement, so the read-modify-write is atomic.
        let result = self
            .db
            .query(
                "UPSERT type::record('permission_assignment', $id) SET \
                 level = $level, subject_id = $subject_id, \
                 permission_id = $permission_id, \
                 model_type = $model_type, object_id = $object_id, \
                 object_type = $object_type, \
                 is_granted = $is_granted, priority = $priority, \
                 expires_at = $expires_at, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("level", input.subject.level().as_str()))
            .bind(("subject_id", input.subject.subject_id()))
            .bind(("permission_id", input.permission_id.to_string()))
            .bind(("model_type", model_type))
            .bind(("object_id", object_id))
            .bind(("object_type", object_type))
            .bind(("is_granted", input.is_granted))
            .bind(("priority", i64::from(input.priority)))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<AssignmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission_assignment".into(),
            id: id_str,
        })?;

        Ok(row.into_assignment(id)?)
    }

    async fn delete(&self, permission_id: Uuid, subject: &AssignmentSubject) -> StrataResult<bool> {
        let mut result = self
            .db
            .query("DELETE type::record('permission_assignment', $id) RETURN BEFORE")
            .bind(("id", subject.record_id(permission_id).to_string()))
            .await
            .map_err(DbError::from)?;

        let removed: Vec<AssignmentRow> = result.take(0).map_err(DbError::from)?;
        Ok(!removed.is_empty())
    }

    async fn list_by_permission(&self, permission_id: Uuid) -> StrataResult<Vec<Assignment>> {
        let query = format!(
            "{SELECT_WITH_ID} WHERE permission_id = $permission_id \
             ORDER BY priority ASC, subject_id ASC"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("permission_id", permission_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssignmentRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(collect_rows(rows)?)
    }

    async fn list(&self, pagination: Pagination) -> StrataResult<PaginatedResult<Assignment>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM permission_assignment GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "{SELECT_WITH_ID} ORDER BY created_at ASC, id ASC \
             LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssignmentRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: collect_rows(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn import(&self, rows: Vec<Assignment>) -> StrataResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut statements = vec!["BEGIN TRANSACTION;".to_owned()];
        for i in 0..rows.len() {
            statements.push(format!(
                "UPSERT type::record('permission_assignment', $id_{i}) SET \
                 level = $level_{i}, subject_id = $subject_id_{i}, \
                 permission_id = $permission_id_{i}, \
                 model_type = $model_type_{i}, object_id = $object_id_{i}, \
                 object_type = $object_type_{i}, \
                 is_granted = $is_granted_{i}, priority = $priority_{i}, \
                 expires_at = $expires_at_{i}, created_at = $created_at_{i}, \
                 updated_at = $updated_at_{i};"
            ));
        }
        statements.push("COMMIT TRANSACTION;".to_owned());
        let query = statements.join("\n");

        let count = rows.len() as u64;
        let mut builder = self.db.query(&query);
        for (i, row) in rows.into_iter().enumerate() {
            let (model_type, object_id, object_type) = refinement_columns(&row.subject);
            builder = builder
                .bind((format!("id_{i}"), row.id.to_string()))
                .bind((format!("level_{i}"), row.subject.level().as_str()))
                .bind((format!("subject_id_{i}"), row.subject.subject_id()))
                .bind((format!("permission_id_{i}"), row.permission_id.to_string()))
                .bind((format!("model_type_{i}"), model_type))
                .bind((format!("object_id_{i}"), object_id))
                .bind((format!("object_type_{i}"), object_type))
                .bind((format!("is_granted_{i}"), row.is_granted))
                .bind((format!("priority_{i}"), i64::from(row.priority)))
                .bind((format!("expires_at_{i}"), row.expires_at))
                .bind((format!("created_at_{i}"), row.created_at))
                .bind((format!("updated_at_{i}"), row.updated_at));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(format!("assignment import rolled back: {e}")))?;

        Ok(count)
    }
}
