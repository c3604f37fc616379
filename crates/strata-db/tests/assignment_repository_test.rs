//! Integration tests for the Assignment repository using in-memory SurrealDB.

use chrono::{Duration, Utc};
use strata_core::models::assignment::{AssignmentLevel, AssignmentSubject, UpsertAssignment};
use strata_core::models::permission::{CreatePermission, Permission, PermissionScope};
use strata_core::repository::{AssignmentRepository, Pagination, PermissionRepository};
use strata_db::repository::{SurrealAssignmentRepository, SurrealPermissionRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Helper: spin up in-memory DB, run migrations, create `Doc.Read`.
async fn setup() -> (Surreal<Db>, Permission) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    strata_db::run_migrations(&db).await.unwrap();

    let perm = SurrealPermissionRepository::new(db.clone())
        .create(CreatePermission {
            resource: "Doc".into(),
            action: "Read".into(),
            description: "Read documents".into(),
            scope: PermissionScope::Object,
        })
        .await
        .unwrap();

    (db, perm)
}

fn upsert(permission_id: Uuid, subject: AssignmentSubject, is_granted: bool) -> UpsertAssignment {
    let priority = subject.level().default_priority();
    UpsertAssignment {
        permission_id,
        subject,
        is_granted,
        priority,
        expires_at: None,
    }
}

fn role(name: &str) -> AssignmentSubject {
    AssignmentSubject::Role { name: name.into() }
}

#[tokio::test]
async fn upsert_is_idempotent_per_key() {
    let (db, perm) = setup().await;
    let repo = SurrealAssignmentRepository::new(db);

    let first = repo.upsert(upsert(perm.id, role("Admin"), true)).await.unwrap();
    let second = repo
        .upsert(UpsertAssignment {
            priority: 7,
            ..upsert(perm.id, role("Admin"), false)
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert!(!second.is_granted);
    assert_eq!(second.priority, 7);

    let rows = repo.list_by_permission(perm.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_granted);
    assert_eq!(rows[0].level(), AssignmentLevel::Role);
}

#[tokio::test]
async fn role_lookup_filters_by_role_names() {
    let (db, perm) = setup().await;
    let repo = SurrealAssignmentRepository::new(db);

    repo.upsert(upsert(perm.id, role("Admin"), true)).await.unwrap();
    repo.upsert(upsert(perm.id, role("Guest"), false)).await.unwrap();

    let rows = repo
        .list_role_assignments(perm.id, &["Admin".to_owned(), "Editor".to_owned()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subject, role("Admin"));

    // Role names are matched exactly.
    let rows = repo
        .list_role_assignments(perm.id, &["admin".to_owned()])
        .await
        .unwrap();
    assert!(rows.is_empty());

    let rows = repo.list_role_assignments(perm.id, &[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn group_lookup_filters_by_group_ids() {
    let (db, perm) = setup().await;
    let repo = SurrealAssignmentRepository::new(db);
    let devs = Uuid::new_v4();
    let ops = Uuid::new_v4();

    repo.upsert(upsert(perm.id, AssignmentSubject::Group { id: devs }, true))
        .await
        .unwrap();
    repo.upsert(upsert(perm.id, AssignmentSubject::Group { id: ops }, false))
        .await
        .unwrap();

    let rows = repo.list_group_assignments(perm.id, &[devs]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subject, AssignmentSubject::Group { id: devs });
    assert_eq!(rows[0].priority, 50);

    let rows = repo
        .list_group_assignments(perm.id, &[devs, ops])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn user_assignment_keeps_expiry() {
    let (db, perm) = setup().await;
    let repo = SurrealAssignmentRepository::new(db);
    let user_id = Uuid::new_v4();
    let yesterday = Utc::now() - Duration::days(1);

    repo.upsert(UpsertAssignment {
        expires_at: Some(yesterday),
        ..upsert(perm.id, AssignmentSubject::User { id: user_id }, true)
    })
    .await
    .unwrap();

    let found = repo
        .find_user_assignment(perm.id, user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(found.is_granted);
    assert!(found.is_expired_at(Utc::now()));

    assert!(
        repo.find_user_assignment(perm.id, Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn model_and_object_rows_are_keyed_by_refinement() {
    let (db, perm) = setup().await;
    let repo = SurrealAssignmentRepository::new(db);
    let user_id = Uuid::new_v4();

    repo.upsert(upsert(
        perm.id,
        AssignmentSubject::Model {
            user_id,
            model_type: "Invoice".into(),
        },
        false,
    ))
    .await
    .unwrap();
    repo.upsert(upsert(
        perm.id,
        AssignmentSubject::Object {
            user_id,
            object_id: "p-1".into(),
            object_type: "Patient".into(),
        },
        false,
    ))
    .await
    .unwrap();

    let model = repo
        .find_model_assignment(perm.id, user_id, "Invoice")
        .await
        .unwrap()
        .unwrap();
    assert!(!model.is_granted);
    assert_eq!(model.priority, 150);
    assert!(
        repo.find_model_assignment(perm.id, user_id, "Order")
            .await
            .unwrap()
            .is_none()
    );

    let object = repo
        .find_object_assignment(perm.id, user_id, "p-1", "Patient")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        object.subject,
        AssignmentSubject::Object {
            user_id,
            object_id: "p-1".into(),
            object_type: "Patient".into(),
        }
    );
    assert!(
        repo.find_object_assignment(perm.id, user_id, "p-2", "Patient")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn delete_reports_whether_a_row_existed() {
    let (db, perm) = setup().await;
    let repo = SurrealAssignmentRepository::new(db);
    let user = AssignmentSubject::User { id: Uuid::new_v4() };

    repo.upsert(upsert(perm.id, user.clone(), true)).await.unwrap();

    assert!(repo.delete(perm.id, &user).await.unwrap());
    assert!(!repo.delete(perm.id, &user).await.unwrap());
    assert!(repo.list_by_permission(perm.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_and_import_round_trip_between_stores() {
    let (source_db, perm) = setup().await;
    let source = SurrealAssignmentRepository::new(source_db.clone());
    source.upsert(upsert(perm.id, role("Admin"), true)).await.unwrap();
    source
        .upsert(upsert(perm.id, AssignmentSubject::User { id: Uuid::new_v4() }, false))
        .await
        .unwrap();

    let page = source.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);

    let target_db = Surreal::new::<Mem>(()).await.unwrap();
    target_db.use_ns("test").use_db("copy").await.unwrap();
    strata_db::run_migrations(&target_db).await.unwrap();
    let target = SurrealAssignmentRepository::new(target_db);

    assert_eq!(target.import(page.items.clone()).await.unwrap(), 2);

    let copied = target.list_by_permission(perm.id).await.unwrap();
    assert_eq!(copied.len(), 2);
    for row in &page.items {
        assert!(copied.iter().any(|c| c.id == row.id && c.subject == row.subject));
    }
}
