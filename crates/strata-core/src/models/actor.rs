//! Actor context: who is asking, derived from identity membership.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role names and group ids currently associated with a user.
///
/// Derived from the identity store, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub role_names: BTreeSet<String>,
    pub group_ids: BTreeSet<Uuid>,
}

impl ActorContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn with_role(mut self, name: impl Into<String>) -> Self {
        self.role_names.insert(name.into());
        self
    }

    pub fn with_group(mut self, group_id: Uuid) -> Self {
        self.group_ids.insert(group_id);
        self
    }
}
