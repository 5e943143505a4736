//! Engage membership & RBAC core
//!
//! The organisation membership subsystem of the Engage customer-engagement
//! platform: the mapping of users to organisations with a role, the
//! authorization protocol over that mapping, and the tenant-safety
//! invariants that must hold under concurrent access:
//!
//! - at most one active membership per (user, organisation) pair
//! - every organisation with members keeps at least one active owner
//! - removed memberships are soft-deleted and restored on re-add
//!
//! The crate is a linkable library, not a service. Users, organisations,
//! and the HTTP layer are owned by the embedding application, which
//! plugs in through the [`domain::UserDirectory`] and
//! [`domain::OrganizationDirectory`] traits and consumes
//! [`infrastructure::ResourceGuard`] for every organisation-scoped
//! resource (agents, leads, chats, calls, tags).

pub mod domain;
pub mod infrastructure;

pub use domain::{
    Actor, DomainError, Membership, MembershipId, MembershipRepository, OrgId, OrgRole,
    OrganizationDirectory, UserDirectory, UserId,
};
pub use infrastructure::{
    AccessEngine, AccessGrant, AddMemberRequest, MembershipService, ResourceGuard,
};
