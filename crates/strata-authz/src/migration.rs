//! Copy permission data from one store to another.
//!
//! Two phases run in order: permissions, then assignments. A phase
//! reads every source row page by page and hands the full set to the
//! target's `import`, which writes it in one transaction. If a phase
//! fails, nothing from it is written; an earlier phase that completed
//! stays in place.

use serde::Serialize;
use strata_core::error::StrataResult;
use strata_core::repository::{
    AssignmentRepository, PaginatedResult, Pagination, PermissionRepository,
};
use tracing::info;

use crate::error::AuthzError;

const DEFAULT_PAGE_SIZE: u64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub permissions: u64,
    pub assignments: u64,
}

pub struct StoreMigrator<'a, SP, SA, TP, TA> {
    source_permissions: &'a SP,
    source_assignments: &'a SA,
    target_permissions: &'a TP,
    target_assignments: &'a TA,
    page_size: u64,
}

impl<'a, SP, SA, TP, TA> StoreMigrator<'a, SP, SA, TP, TA>
where
    SP: PermissionRepository,
    SA: AssignmentRepository,
    TP: PermissionRepository,
    TA: AssignmentRepository,
{
    pub fn new(
        source: (&'a SP, &'a SA),
        target: (&'a TP, &'a TA),
    ) -> Self {
        Self {
            source_permissions: source.0,
            source_assignments: source.1,
            target_permissions: target.0,
            target_assignments: target.1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn run(&self) -> Result<MigrationReport, AuthzError> {
        let permissions = self
            .copy_permissions()
            .await
            .map_err(|source| AuthzError::MigrationPhase {
                phase: "permissions",
                source,
            })?;
        info!(rows = permissions, "Permission phase migrated");

        let assignments = self
            .copy_assignments()
            .await
            .map_err(|source| AuthzError::MigrationPhase {
                phase: "assignments",
                source,
            })?;
        info!(rows = assignments, "Assignment phase migrated");

        Ok(MigrationReport {
            permissions,
            assignments,
        })
    }

    async fn copy_permissions(&self) -> StrataResult<u64> {
        let rows = read_all(self.page_size, |page| self.source_permissions.list(page)).await?;
        self.target_permissions.import(rows).await
    }

    async fn copy_assignments(&self) -> StrataResult<u64> {
        let rows = read_all(self.page_size, |page| self.source_assignments.list(page)).await?;
        self.target_assignments.import(rows).await
    }
}

/// Drain a paged listing into one vector.
async fn read_all<T, F, Fut>(page_size: u64, mut fetch: F) -> StrataResult<Vec<T>>
where
    F: FnMut(Pagination) -> Fut,
    Fut: Future<Output = StrataResult<PaginatedResult<T>>>,
{
    let mut rows = Vec::new();
    let mut next = Some(Pagination {
        offset: 0,
        limit: page_size,
    });

    while let Some(page) = next {
        let result = fetch(page).await?;
        next = result.next_page();
        rows.extend(result.items);
    }
    Ok(rows)
}
