//! Permission domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StrataError;

/// Finest granularity at which a permission may be restricted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PermissionScope {
    #[default]
    Global,
    Model,
    Object,
}

impl PermissionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Model => "Model",
            Self::Object => "Object",
        }
    }
}

impl FromStr for PermissionScope {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Global" => Ok(Self::Global),
            "Model" => Ok(Self::Model),
            "Object" => Ok(Self::Object),
            other => Err(StrataError::Validation {
                message: format!("unknown permission scope: {other}"),
            }),
        }
    }
}

/// A capability identified by `(resource, action)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Permission {
    pub id: Uuid,
    /// The protected noun (e.g., `Document`).
    pub resource: String,
    /// The verb on the resource (e.g., `Read`).
    pub action: String,
    pub description: String,
    pub scope: PermissionScope,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn name(&self) -> PermissionName {
        PermissionName {
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub resource: String,
    pub action: String,
    pub description: String,
    pub scope: PermissionScope,
}

/// Permissions are never renamed; only metadata and activation change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermission {
    pub description: Option<String>,
    pub scope: Option<PermissionScope>,
    pub is_active: Option<bool>,
}

/// The `Resource.Action` form of a permission.
///
/// Parsing splits on the first `.`. Comparison is exact and
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName {
    pub resource: String,
    pub action: String,
}

impl PermissionName {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl FromStr for PermissionName {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((resource, action)) if !resource.is_empty() && !action.is_empty() => {
                Ok(Self::new(resource, action))
            }
            _ => Err(StrataError::Validation {
                message: format!("permission name must be `Resource.Action`, got `{s}`"),
            }),
        }
    }
}

impl TryFrom<String> for PermissionName {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionName> for String {
    fn from(name: PermissionName) -> Self {
        name.to_string()
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_and_action() {
        let name: PermissionName = "Doc.Read".parse().unwrap();
        assert_eq!(name.resource, "Doc");
        assert_eq!(name.action, "Read");
        assert_eq!(name.to_string(), "Doc.Read");
    }

    #[test]
    fn splits_on_first_dot_only() {
        let name: PermissionName = "Reports.Export.Csv".parse().unwrap();
        assert_eq!(name.resource, "Reports");
        assert_eq!(name.action, "Export.Csv");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["Doc", ".Read", "Doc.", ""] {
            assert!(bad.parse::<PermissionName>().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn names_are_case_sensitive() {
        let a: PermissionName = "Doc.Read".parse().unwrap();
        let b: PermissionName = "doc.read".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn scope_round_trips_through_str() {
        for scope in [
            PermissionScope::Global,
            PermissionScope::Model,
            PermissionScope::Object,
        ] {
            assert_eq!(scope.as_str().parse::<PermissionScope>().unwrap(), scope);
        }
        assert!("global".parse::<PermissionScope>().is_err());
    }
}
