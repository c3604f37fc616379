//! SurrealDB repository implementations.

mod assignment;
mod identity;
mod permission;

pub use assignment::SurrealAssignmentRepository;
pub use identity::SurrealIdentityRepository;
pub use permission::SurrealPermissionRepository;
