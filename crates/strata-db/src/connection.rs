//! Connections to a permission store.
//!
//! A store is one namespace/database pair on a SurrealDB server. Copying
//! between stores on the same server reuses the source credentials, so a
//! target config is derived from the source with [`DbConfig::for_store`].

use std::fmt;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// WebSocket address, e.g. `127.0.0.1:8000`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "strata".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Same server and credentials, different namespace/database.
    pub fn for_store(&self, namespace: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            database: database.into(),
            ..self.clone()
        }
    }

    /// Whether both configs address the same store on the same server.
    pub fn same_store(&self, other: &Self) -> bool {
        self.url == other.url
            && self.namespace == other.namespace
            && self.database == other.database
    }

    pub fn store(&self) -> StoreName<'_> {
        StoreName(self)
    }
}

/// `namespace/database` for log fields and messages.
pub struct StoreName<'a>(&'a DbConfig);

impl fmt::Display for StoreName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.namespace, self.0.database)
    }
}

/// An authenticated client bound to one store.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
    config: DbConfig,
}

impl DbManager {
    /// Sign in as root and select the configured store.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(url = %config.url, store = %config.store(), "Connecting to permission store");

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self {
            db,
            config: config.clone(),
        })
    }

    /// Connect and bring the schema up to date.
    pub async fn connect_migrated(config: &DbConfig) -> Result<Self, DbError> {
        let manager = Self::connect(config).await?;
        manager.migrate().await?;
        Ok(manager)
    }

    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await?;
        info!(store = %self.config.store(), "Schema is up to date");
        Ok(())
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}
