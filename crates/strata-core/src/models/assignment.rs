//! Grant/deny assignment domain model.
//!
//! One shape covers all five levels. The [`AssignmentSubject`] carries
//! the level-specific part of the uniqueness key; together with the
//! permission id it identifies exactly one assignment row.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StrataError;

/// Namespace for deterministic assignment record ids.
const ASSIGNMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_93d4_4a51_8e0f_5c2d_71a9_b3e4);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssignmentLevel {
    Role,
    Group,
    User,
    Model,
    Object,
}

impl AssignmentLevel {
    /// Human-facing default priority. Not used for deny/grant tie-breaks.
    pub fn default_priority(&self) -> i32 {
        match self {
            Self::Role => 0,
            Self::Group => 50,
            Self::User => 100,
            Self::Model => 150,
            Self::Object => 200,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "Role",
            Self::Group => "Group",
            Self::User => "User",
            Self::Model => "Model",
            Self::Object => "Object",
        }
    }
}

impl fmt::Display for AssignmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentLevel {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Role" => Ok(Self::Role),
            "Group" => Ok(Self::Group),
            "User" => Ok(Self::User),
            "Model" => Ok(Self::Model),
            "Object" => Ok(Self::Object),
            other => Err(StrataError::Validation {
                message: format!("unknown assignment level: {other}"),
            }),
        }
    }
}

/// Who (and for model/object rows, on what) an assignment applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "level")]
pub enum AssignmentSubject {
    Role {
        name: String,
    },
    Group {
        id: Uuid,
    },
    User {
        id: Uuid,
    },
    Model {
        user_id: Uuid,
        model_type: String,
    },
    Object {
        user_id: Uuid,
        object_id: String,
        object_type: String,
    },
}

impl AssignmentSubject {
    pub fn level(&self) -> AssignmentLevel {
        match self {
            Self::Role { .. } => AssignmentLevel::Role,
            Self::Group { .. } => AssignmentLevel::Group,
            Self::User { .. } => AssignmentLevel::User,
            Self::Model { .. } => AssignmentLevel::Model,
            Self::Object { .. } => AssignmentLevel::Object,
        }
    }

    /// The role name, group id or user id this row belongs to.
    pub fn subject_id(&self) -> String {
        match self {
            Self::Role { name } => name.clone(),
            Self::Group { id } | Self::User { id } => id.to_string(),
            Self::Model { user_id, .. } | Self::Object { user_id, .. } => user_id.to_string(),
        }
    }

    /// Deterministic record id for the `(subject, permission)` key.
    ///
    /// Two upserts with the same key address the same row.
    pub fn record_id(&self, permission_id: Uuid) -> Uuid {
        let mut key = format!("{}\u{1f}{}", self.level(), self.subject_id());
        match self {
            Self::Model { model_type, .. } => {
                key.push('\u{1f}');
                key.push_str(model_type);
            }
            Self::Object {
                object_id,
                object_type,
                ..
            } => {
                key.push('\u{1f}');
                key.push_str(object_type);
                key.push('\u{1f}');
                key.push_str(object_id);
            }
            _ => {}
        }
        key.push('\u{1f}');
        key.push_str(&permission_id.to_string());
        Uuid::new_v5(&ASSIGNMENT_NAMESPACE, key.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: Uuid,
    pub permission_id: Uuid,
    pub subject: AssignmentSubject,
    /// `false` is an explicit deny, not an absence.
    pub is_granted: bool,
    pub priority: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn level(&self) -> AssignmentLevel {
        self.subject.level()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// An expired assignment resolves as if it did not exist.
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertAssignment {
    pub permission_id: Uuid,
    pub subject: AssignmentSubject,
    pub is_granted: bool,
    pub priority: i32,
    pub expires_at: Option<DateTime<Utc>>,
}
