//! Membership entity
//!
//! The core row of the crate: a user's role within an organisation. At most
//! one active (non-soft-deleted) membership exists per (user, organisation)
//! pair, and the row is written exclusively by membership store
//! implementations - mutators are `pub(crate)` for that reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{OrgId, OrgRole, UserId};

/// Unique membership identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipId(Uuid);

impl MembershipId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MembershipId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MembershipId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MembershipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Organisation membership linking a user to an organisation with a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Unique membership ID
    id: MembershipId,
    /// User reference
    user_id: UserId,
    /// Organisation reference
    org_id: OrgId,
    /// Role within the organisation
    role: OrgRole,
    /// Soft-delete flag; a deleted membership can be restored by a later
    /// add for the same (user, organisation) pair
    deleted: bool,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
}

impl Membership {
    /// Create a new active membership
    pub fn new(user_id: UserId, org_id: OrgId, role: OrgRole) -> Self {
        let now = Utc::now();

        Self {
            id: MembershipId::new(),
            user_id,
            org_id,
            role,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstruct a membership from stored fields
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: MembershipId,
        user_id: UserId,
        org_id: OrgId,
        role: OrgRole,
        deleted: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            org_id,
            role,
            deleted,
            created_at,
            updated_at,
        }
    }

    // Getters

    pub fn id(&self) -> MembershipId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn org_id(&self) -> &OrgId {
        &self.org_id
    }

    pub fn role(&self) -> OrgRole {
        self.role
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Check if the membership is active (not soft-deleted)
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Check if this membership belongs to the given user
    pub fn belongs_to(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    // Mutators - store implementations only

    /// Change the role
    pub(crate) fn set_role(&mut self, role: OrgRole) {
        self.role = role;
        self.touch();
    }

    /// Soft-delete the membership
    pub(crate) fn soft_delete(&mut self) {
        self.deleted = true;
        self.touch();
    }

    /// Restore a soft-deleted membership with the newly requested role.
    ///
    /// The previous role is overwritten, not preserved.
    pub(crate) fn restore(&mut self, role: OrgRole) {
        self.deleted = false;
        self.role = role;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(user: &str, org: &str, role: OrgRole) -> Membership {
        Membership::new(UserId::new(user).unwrap(), OrgId::new(org).unwrap(), role)
    }

    #[test]
    fn test_membership_creation() {
        let m = membership("u1", "org-1", OrgRole::Owner);

        assert_eq!(m.user_id().as_str(), "u1");
        assert_eq!(m.org_id().as_str(), "org-1");
        assert_eq!(m.role(), OrgRole::Owner);
        assert!(m.is_active());
        assert!(!m.is_deleted());
    }

    #[test]
    fn test_membership_ids_unique() {
        let a = membership("u1", "org-1", OrgRole::Member);
        let b = membership("u1", "org-1", OrgRole::Member);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_membership_belongs_to() {
        let m = membership("u1", "org-1", OrgRole::Member);
        assert!(m.belongs_to(&UserId::new("u1").unwrap()));
        assert!(!m.belongs_to(&UserId::new("u2").unwrap()));
    }

    #[test]
    fn test_membership_set_role_touches() {
        let mut m = membership("u1", "org-1", OrgRole::Member);
        let before = m.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(10));

        m.set_role(OrgRole::Admin);
        assert_eq!(m.role(), OrgRole::Admin);
        assert!(m.updated_at() > before);
    }

    #[test]
    fn test_membership_soft_delete_and_restore() {
        let mut m = membership("u1", "org-1", OrgRole::Admin);

        m.soft_delete();
        assert!(m.is_deleted());
        assert!(!m.is_active());
        // role survives soft deletion
        assert_eq!(m.role(), OrgRole::Admin);

        m.restore(OrgRole::Member);
        assert!(m.is_active());
        // restore overwrites the role with the newly requested one
        assert_eq!(m.role(), OrgRole::Member);
    }
}
