//! Strata CLI — operator entry point for permission stores.

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use strata_authz::{AuthzError, Decision, PermissionManifest, PermissionResolver, StoreMigrator};
use strata_core::error::StrataError;
use strata_core::repository::ActorContextProvider;
use strata_db::repository::{
    SurrealAssignmentRepository, SurrealIdentityRepository, SurrealPermissionRepository,
};
use strata_db::{DbError, DbManager};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[derive(Debug, Error)]
enum CliError {
    #[error("database connection failed: {0}")]
    Connect(#[from] surrealdb::Error),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Strata(#[from] StrataError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("copy target {0} is the source store")]
    SameStore(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strata=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.db.config();
    let manager = DbManager::connect(&config).await?;
    let db = manager.client();

    match cli.command {
        Command::Migrate => manager.migrate().await?,
        Command::Seed { manifest } => {
            let json = tokio::fs::read_to_string(&manifest)
                .await
                .map_err(|source| CliError::Read {
                    path: manifest.clone(),
                    source,
                })?;
            let manifest = PermissionManifest::from_json(&json)?;

            manager.migrate().await?;
            let report = manifest
                .bootstrap(
                    &SurrealPermissionRepository::new(db.clone()),
                    &SurrealAssignmentRepository::new(db.clone()),
                    &SurrealIdentityRepository::new(db.clone()),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Check {
            user,
            permission,
            model_type,
            object_id,
            object_type,
        } => {
            let identity = SurrealIdentityRepository::new(db.clone());
            let actor = match identity.actor_context(user).await {
                Ok(actor) => actor,
                Err(e) if e.is_not_found() => {
                    println!("{permission}: denied (unknown user)");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let resolver = PermissionResolver::new(
                SurrealPermissionRepository::new(db.clone()),
                SurrealAssignmentRepository::new(db.clone()),
            );
            let (resource, action) = (&permission.resource, &permission.action);
            let decision: Decision = match (model_type, object_id, object_type) {
                (Some(model_type), _, _) => {
                    resolver
                        .evaluate_model(&actor, resource, action, &model_type)
                        .await?
                }
                (None, Some(object_id), Some(object_type)) => {
                    resolver
                        .evaluate_object(&actor, resource, action, &object_id, &object_type)
                        .await?
                }
                _ => resolver.evaluate(&actor, resource, action).await?,
            };
            println!("{permission}: {decision}");
        }
        Command::Copy {
            target_namespace,
            target_database,
            page_size,
        } => {
            let target_config = config.for_store(target_namespace, target_database);
            if config.same_store(&target_config) {
                return Err(CliError::SameStore(target_config.store().to_string()));
            }
            let target = DbManager::connect_migrated(&target_config).await?;
            info!(
                source = %config.store(),
                target = %target.config().store(),
                "Copying permission store"
            );

            let source_permissions = SurrealPermissionRepository::new(db.clone());
            let source_assignments = SurrealAssignmentRepository::new(db.clone());
            let target_permissions = SurrealPermissionRepository::new(target.client().clone());
            let target_assignments = SurrealAssignmentRepository::new(target.client().clone());

            let report = StoreMigrator::new(
                (&source_permissions, &source_assignments),
                (&target_permissions, &target_assignments),
            )
            .with_page_size(page_size)
            .run()
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
