//! Membership repository trait
//!
//! The membership store is the only component allowed to write membership
//! rows. Each mutating operation runs inside a single backend transaction
//! that re-checks the relevant tenant-safety invariant immediately before
//! the write: `insert` re-checks active-pair uniqueness, `update_role` and
//! `soft_delete` re-check the active owner count. Callers are expected to
//! have run the same checks optimistically already; the in-transaction
//! check is the binding one.

use async_trait::async_trait;

use crate::domain::{DomainError, Membership, MembershipId, OrgId, OrgRole, UserId};

#[async_trait]
pub trait MembershipRepository: Send + Sync + std::fmt::Debug {
    /// Find the active membership for a (user, organisation) pair
    async fn find_active(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<Membership>, DomainError>;

    /// Find an active membership by ID
    async fn find_active_by_id(
        &self,
        id: &MembershipId,
    ) -> Result<Option<Membership>, DomainError>;

    /// Find the membership row for a (user, organisation) pair, whether
    /// active or soft-deleted. Used to pick between insert and restore.
    async fn find_pair(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<Membership>, DomainError>;

    /// List the active memberships of an organisation, newest first
    async fn list_active(&self, org_id: &OrgId) -> Result<Vec<Membership>, DomainError>;

    /// Count the active memberships of an organisation holding a role
    async fn count_active_with_role(
        &self,
        org_id: &OrgId,
        role: OrgRole,
    ) -> Result<usize, DomainError>;

    /// Insert a new active membership.
    ///
    /// Fails with `Conflict` if an active membership already exists for the
    /// pair; the check runs under the write transaction.
    async fn insert(
        &self,
        user_id: UserId,
        org_id: OrgId,
        role: OrgRole,
    ) -> Result<Membership, DomainError>;

    /// Restore a soft-deleted membership, setting the given role.
    ///
    /// Fails with `NotFound` if no such row exists and `Conflict` if the
    /// row is currently active.
    async fn restore(&self, id: &MembershipId, role: OrgRole) -> Result<Membership, DomainError>;

    /// Change the role of an active membership.
    ///
    /// Demoting the organisation's only active owner fails with
    /// `LastOwner`; the owner count is re-checked under the transaction.
    async fn update_role(
        &self,
        id: &MembershipId,
        role: OrgRole,
    ) -> Result<Membership, DomainError>;

    /// Soft-delete an active membership.
    ///
    /// Removing the organisation's only active owner fails with
    /// `LastOwner`; the owner count is re-checked under the transaction.
    async fn soft_delete(&self, id: &MembershipId) -> Result<Membership, DomainError>;
}
