//! Authorization error types.

use strata_core::error::StrataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid permission name: {0}")]
    InvalidPermissionName(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("migration phase `{phase}` failed and was rolled back: {source}")]
    MigrationPhase {
        phase: &'static str,
        #[source]
        source: StrataError,
    },
}

impl From<AuthzError> for StrataError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InvalidPermissionName(_) | AuthzError::InvalidManifest(_) => {
                StrataError::Validation {
                    message: err.to_string(),
                }
            }
            AuthzError::MigrationPhase { .. } => StrataError::Database(err.to_string()),
        }
    }
}
