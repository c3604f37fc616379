use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use strata_core::models::permission::PermissionName;
use strata_db::DbConfig;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata permission store tooling")]
pub struct Cli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct DbArgs {
    /// SurrealDB WebSocket address
    #[arg(long, env = "STRATA_DB_URL", default_value = "127.0.0.1:8000", global = true)]
    pub db_url: String,

    #[arg(long, env = "STRATA_DB_NAMESPACE", default_value = "strata", global = true)]
    pub namespace: String,

    #[arg(long, env = "STRATA_DB_DATABASE", default_value = "main", global = true)]
    pub database: String,

    /// Root username
    #[arg(long, env = "STRATA_DB_USERNAME", default_value = "root", global = true)]
    pub username: String,

    /// Root password
    #[arg(
        long,
        env = "STRATA_DB_PASSWORD",
        default_value = "root",
        hide_env_values = true,
        global = true
    )]
    pub password: String,
}

impl DbArgs {
    pub fn config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.namespace.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Register permissions, roles and role grants from a JSON manifest
    Seed {
        /// Path to the manifest file
        manifest: PathBuf,
    },
    /// Evaluate a permission for a user and print the decision
    Check {
        /// User id
        #[arg(long)]
        user: Uuid,

        /// Permission as `Resource.Action`
        permission: PermissionName,

        /// Restrict to a model type
        #[arg(long, conflicts_with = "object_id")]
        model_type: Option<String>,

        /// Restrict to one object (requires --object-type)
        #[arg(long, requires = "object_type")]
        object_id: Option<String>,

        #[arg(long, requires = "object_id")]
        object_type: Option<String>,
    },
    /// Copy permissions and assignments into another namespace/database
    Copy {
        #[arg(long)]
        target_namespace: String,

        #[arg(long)]
        target_database: String,

        /// Rows read from the source per page
        #[arg(long, default_value_t = 200)]
        page_size: u64,
    },
}
