//! Error types for the Strata permission system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrataError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A uniqueness constraint would be violated.
    #[error("Entity already exists: {entity}")]
    Conflict { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StrataError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StrataResult<T> = Result<T, StrataError>;
