//! Administration flows against an in-memory SurrealDB store.

use chrono::{Duration, Utc};
use strata_authz::{
    AdminOutcome, AuthzConfig, GrantInput, PermissionAdmin, PermissionResolver, RevokePolicy,
};
use strata_core::error::StrataError;
use strata_core::models::actor::ActorContext;
use strata_core::models::assignment::AssignmentSubject;
use strata_core::models::permission::{CreatePermission, PermissionScope};
use strata_core::models::role::CreateRole;
use strata_core::models::user::{CreateUser, User};
use strata_core::repository::{AssignmentRepository, IdentityRepository, PermissionRepository};
use strata_db::repository::{
    SurrealAssignmentRepository, SurrealIdentityRepository, SurrealPermissionRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Admin = PermissionAdmin<
    SurrealPermissionRepository<Db>,
    SurrealAssignmentRepository<Db>,
    SurrealIdentityRepository<Db>,
>;

struct Fixture {
    db: Surreal<Db>,
    admin: Admin,
    user: User,
}

async fn setup(config: AuthzConfig) -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    strata_db::run_migrations(&db).await.unwrap();

    let identity = SurrealIdentityRepository::new(db.clone());
    let user = identity
        .create_user(CreateUser {
            username: "alice".into(),
            email: "alice@example.com".into(),
        })
        .await
        .unwrap();

    Fixture {
        admin: PermissionAdmin::new(
            SurrealPermissionRepository::new(db.clone()),
            SurrealAssignmentRepository::new(db.clone()),
            identity,
            config,
        ),
        db,
        user,
    }
}

impl Fixture {
    fn resolver(
        &self,
    ) -> PermissionResolver<SurrealPermissionRepository<Db>, SurrealAssignmentRepository<Db>> {
        PermissionResolver::new(
            SurrealPermissionRepository::new(self.db.clone()),
            SurrealAssignmentRepository::new(self.db.clone()),
        )
    }

    fn subject(&self) -> AssignmentSubject {
        AssignmentSubject::User { id: self.user.id }
    }

    fn actor(&self) -> ActorContext {
        ActorContext::new(self.user.id)
    }

    async fn register(&self, resource: &str, action: &str) {
        self.admin
            .register_permission(CreatePermission {
                resource: resource.into(),
                action: action.into(),
                description: String::new(),
                scope: PermissionScope::Global,
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn register_rejects_duplicates() {
    let fx = setup(AuthzConfig::default()).await;
    fx.register("Doc", "Read").await;

    let err = fx
        .admin
        .register_permission(CreatePermission {
            resource: "Doc".into(),
            action: "Read".into(),
            description: String::new(),
            scope: PermissionScope::Global,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::Conflict { .. }));
}

#[tokio::test]
async fn grant_then_check_round_trip() {
    let fx = setup(AuthzConfig::default()).await;
    fx.register("Doc", "Read").await;

    let outcome = fx
        .admin
        .grant(GrantInput::allow(fx.subject(), "Doc", "Read"))
        .await
        .unwrap();
    let AdminOutcome::Applied(row) = outcome else {
        panic!("expected applied, got {outcome:?}");
    };
    assert!(row.is_granted);
    assert_eq!(row.priority, 100);

    assert!(fx.resolver().has_permission(&fx.actor(), "Doc", "Read").await);
}

#[tokio::test]
async fn soft_revoke_writes_explicit_deny() {
    let fx = setup(AuthzConfig::default()).await;
    fx.register("Doc", "Read").await;
    fx.admin
        .grant(GrantInput::allow(fx.subject(), "Doc", "Read"))
        .await
        .unwrap();

    let outcome = fx
        .admin
        .revoke(fx.subject(), "Doc", "Read")
        .await
        .unwrap();
    assert!(matches!(outcome, AdminOutcome::Applied(ref row) if !row.is_granted));
    assert!(!fx.resolver().has_permission(&fx.actor(), "Doc", "Read").await);

    // The user-level deny also blocks a later role grant.
    let identity = SurrealIdentityRepository::new(fx.db.clone());
    let editor = identity
        .create_role(CreateRole {
            name: "Editor".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    identity.assign_role(fx.user.id, editor.id).await.unwrap();
    fx.admin
        .grant(GrantInput::allow(
            AssignmentSubject::Role {
                name: "Editor".into(),
            },
            "Doc",
            "Read",
        ))
        .await
        .unwrap();
    let actor = fx.actor().with_role("Editor");
    assert!(!fx.resolver().has_permission(&actor, "Doc", "Read").await);
}

#[tokio::test]
async fn soft_revoke_keeps_the_granted_priority() {
    let fx = setup(AuthzConfig::default()).await;
    fx.register("Doc", "Read").await;
    fx.admin
        .grant(
            GrantInput::allow(fx.subject(), "Doc", "Read")
                .with_priority(120)
                .expiring_at(Utc::now() + Duration::days(7)),
        )
        .await
        .unwrap();

    let outcome = fx
        .admin
        .revoke(fx.subject(), "Doc", "Read")
        .await
        .unwrap();
    let AdminOutcome::Applied(row) = outcome else {
        panic!("expected an applied deny, got {outcome:?}");
    };
    assert!(!row.is_granted);
    assert_eq!(row.priority, 120);
    assert_eq!(row.expires_at, None);

    // Without a prior row the level default applies.
    fx.register("Doc", "Write").await;
    let outcome = fx
        .admin
        .revoke(fx.subject(), "Doc", "Write")
        .await
        .unwrap();
    let AdminOutcome::Applied(row) = outcome else {
        panic!("expected an applied deny, got {outcome:?}");
    };
    assert_eq!(row.priority, fx.subject().level().default_priority());
}

#[tokio::test]
async fn hard_revoke_removes_the_row() {
    let fx = setup(AuthzConfig {
        revoke_policy: RevokePolicy::HardDelete,
        ..Default::default()
    })
    .await;
    fx.register("Doc", "Read").await;
    fx.admin
        .grant(GrantInput::allow(fx.subject(), "Doc", "Read"))
        .await
        .unwrap();

    let outcome = fx
        .admin
        .revoke(fx.subject(), "Doc", "Read")
        .await
        .unwrap();
    assert_eq!(outcome, AdminOutcome::Removed);
    assert!(!fx.resolver().has_permission(&fx.actor(), "Doc", "Read").await);

    let permission = SurrealPermissionRepository::new(fx.db.clone())
        .find_by_name("Doc", "Read")
        .await
        .unwrap()
        .unwrap();
    let rows = SurrealAssignmentRepository::new(fx.db.clone())
        .list_by_permission(permission.id)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn repeated_grants_leave_one_row() {
    let fx = setup(AuthzConfig::default()).await;
    fx.register("Doc", "Read").await;
    let expires_at = Utc::now() + Duration::days(7);

    for _ in 0..2 {
        fx.admin
            .grant(
                GrantInput::allow(fx.subject(), "Doc", "Read")
                    .with_priority(120)
                    .expiring_at(expires_at),
            )
            .await
            .unwrap();
    }
    fx.admin
        .grant(GrantInput::deny(fx.subject(), "Doc", "Read").with_priority(130))
        .await
        .unwrap();

    let permission = SurrealPermissionRepository::new(fx.db.clone())
        .find_by_name("Doc", "Read")
        .await
        .unwrap()
        .unwrap();
    let rows = SurrealAssignmentRepository::new(fx.db.clone())
        .list_by_permission(permission.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_granted);
    assert_eq!(rows[0].priority, 130);
    assert!(rows[0].expires_at.is_none());
}

#[tokio::test]
async fn unknown_subject_is_reported() {
    let fx = setup(AuthzConfig::default()).await;
    fx.register("Doc", "Read").await;

    let outcome = fx
        .admin
        .grant(GrantInput::allow(
            AssignmentSubject::User { id: Uuid::new_v4() },
            "Doc",
            "Read",
        ))
        .await
        .unwrap();
    assert_eq!(outcome, AdminOutcome::SubjectNotFound);

    let outcome = fx
        .admin
        .revoke(
            AssignmentSubject::Role {
                name: "Ghost".into(),
            },
            "Doc",
            "Read",
        )
        .await
        .unwrap();
    assert_eq!(outcome, AdminOutcome::SubjectNotFound);
}

#[tokio::test]
async fn unregistered_permission_is_reported() {
    let fx = setup(AuthzConfig::default()).await;

    let outcome = fx
        .admin
        .grant(GrantInput::allow(fx.subject(), "Doc", "Read"))
        .await
        .unwrap();
    assert_eq!(outcome, AdminOutcome::PermissionNotFound);
    assert!(!outcome.is_success());

    let outcome = fx
        .admin
        .revoke(fx.subject(), "Doc", "Read")
        .await
        .unwrap();
    assert_eq!(outcome, AdminOutcome::PermissionNotFound);
}

#[tokio::test]
async fn auto_create_registers_missing_permission() {
    let fx = setup(AuthzConfig {
        auto_create_permissions: true,
        ..Default::default()
    })
    .await;

    let outcome = fx
        .admin
        .grant(GrantInput::allow(
            AssignmentSubject::Object {
                user_id: fx.user.id,
                object_id: "42".into(),
                object_type: "Invoice".into(),
            },
            "Invoice",
            "Approve",
        ))
        .await
        .unwrap();
    assert!(outcome.is_success());

    let permission = SurrealPermissionRepository::new(fx.db.clone())
        .find_by_name("Invoice", "Approve")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(permission.scope, PermissionScope::Object);
}

#[tokio::test]
async fn deactivation_denies_existing_grants() {
    let fx = setup(AuthzConfig::default()).await;
    fx.register("Doc", "Read").await;
    fx.admin
        .grant(GrantInput::allow(fx.subject(), "Doc", "Read"))
        .await
        .unwrap();

    let permission = fx.admin.deactivate_permission("Doc", "Read").await.unwrap();
    assert!(!permission.is_active);
    assert!(!fx.resolver().has_permission(&fx.actor(), "Doc", "Read").await);

    let err = fx
        .admin
        .deactivate_permission("Doc", "Missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
