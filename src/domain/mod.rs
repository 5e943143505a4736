//! Domain layer - Core business logic and entities

pub mod actor;
pub mod error;
pub mod membership;
pub mod organization;
pub mod role;
pub mod user;

pub use actor::Actor;
pub use error::DomainError;
pub use membership::{Membership, MembershipId, MembershipRepository};
pub use organization::{
    validate_org_id, OrgId, OrgValidationError, OrganizationDirectory, OrganizationRecord,
};
pub use role::OrgRole;
pub use user::{
    validate_user_id, UserDirectory, UserId, UserRecord, UserStatus, UserValidationError,
};
