//! Infrastructure layer - External service implementations

pub mod access;
pub mod directory;
pub mod membership;

pub use access::{AccessEngine, AccessGrant, ResourceGuard};
pub use directory::{InMemoryOrganizationDirectory, InMemoryUserDirectory};
pub use membership::{
    AddMemberRequest, InMemoryMembershipRepository, MembershipService, PgMembershipRepository,
    PostgresConfig,
};
