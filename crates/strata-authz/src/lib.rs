//! Strata Authz — layered permission resolution, administration,
//! manifest bootstrap and store-to-store migration.

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod migration;
pub mod resolver;

pub use admin::{AdminOutcome, GrantInput, PermissionAdmin};
pub use cache::CachedActorProvider;
pub use config::{AuthzConfig, RevokePolicy};
pub use error::AuthzError;
pub use manifest::{BootstrapReport, PermissionManifest};
pub use migration::{MigrationReport, StoreMigrator};
pub use resolver::{Decision, DenyReason, PermissionResolver};
