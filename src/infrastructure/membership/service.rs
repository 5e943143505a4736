//! Membership lifecycle service
//!
//! The state machine over (user, organisation) pairs: Absent,
//! Active(role), SoftDeleted(role). All create/role-change/remove rules
//! live here - who may perform the transition, the admin/owner cross-role
//! restrictions, the self-action rules, and the last-owner guard.
//!
//! Invariant-bearing preconditions run twice: optimistically here for a
//! precise caller-facing error, and bindingly inside the membership
//! store's write transaction, which is the check that actually holds
//! under concurrency.

use std::sync::Arc;

use tracing::info;

use crate::domain::{
    Actor, DomainError, Membership, MembershipId, MembershipRepository, OrgId, OrgRole,
    OrganizationDirectory, UserDirectory, UserId,
};
use crate::infrastructure::access::{AccessEngine, AccessGrant};

/// Request for adding a member to an organisation
#[derive(Debug, Clone)]
pub struct AddMemberRequest {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role: OrgRole,
}

/// Membership lifecycle operations
#[derive(Debug, Clone)]
pub struct MembershipService {
    memberships: Arc<dyn MembershipRepository>,
    users: Arc<dyn UserDirectory>,
    organizations: Arc<dyn OrganizationDirectory>,
    access: AccessEngine,
}

impl MembershipService {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        users: Arc<dyn UserDirectory>,
        organizations: Arc<dyn OrganizationDirectory>,
    ) -> Self {
        let access = AccessEngine::new(memberships.clone());
        Self {
            memberships,
            users,
            organizations,
            access,
        }
    }

    /// The access engine backing this service, for sharing with resource
    /// guards
    pub fn access(&self) -> &AccessEngine {
        &self.access
    }

    /// Create the founding Owner membership of a new organisation.
    ///
    /// Called by the organisation-creation flow, in the same unit of work
    /// that creates the organisation itself; there is no authorization
    /// step because the organisation has no members yet. Every
    /// organisation with members has held at least one owner from birth.
    pub async fn add_founding_owner(
        &self,
        org_id: &OrgId,
        user_id: &UserId,
    ) -> Result<Membership, DomainError> {
        info!(org = %org_id, user = %user_id, "Creating founding owner membership");

        self.require_addable_user(user_id).await?;

        self.memberships
            .insert(user_id.clone(), org_id.clone(), OrgRole::Owner)
            .await
    }

    /// Add a user to an organisation.
    ///
    /// Requires an Owner or Admin actor; Admins may not grant the Owner
    /// role. Re-adding a previously removed user restores the
    /// soft-deleted membership with the newly requested role.
    pub async fn add_member(
        &self,
        actor: &Actor,
        request: AddMemberRequest,
    ) -> Result<Membership, DomainError> {
        info!(
            actor = %actor.user_id,
            org = %request.org_id,
            user = %request.user_id,
            role = %request.role,
            "Adding member"
        );

        self.require_addressable_org(&request.org_id).await?;
        self.require_addable_user(&request.user_id).await?;

        let grant = self
            .access
            .authorize(actor, &request.org_id, &[OrgRole::Owner, OrgRole::Admin])
            .await?;

        // Admins may not mint owners
        if grant.role() == Some(OrgRole::Admin) && request.role.is_owner() {
            return Err(DomainError::forbidden_cross_role(
                "Admins may not grant the owner role",
            ));
        }

        // Pick the transition: Absent -> insert, SoftDeleted -> restore,
        // Active -> conflict. The store re-checks uniqueness at write time.
        match self
            .memberships
            .find_pair(&request.user_id, &request.org_id)
            .await?
        {
            Some(existing) if existing.is_active() => Err(DomainError::conflict(format!(
                "User '{}' is already a member of organization '{}'",
                request.user_id, request.org_id
            ))),
            Some(deleted) => self.memberships.restore(&deleted.id(), request.role).await,
            None => {
                self.memberships
                    .insert(request.user_id, request.org_id, request.role)
                    .await
            }
        }
    }

    /// Change the role of a membership.
    ///
    /// Owner-only. Actors may not change their own role, and demoting an
    /// owner requires another active owner to remain.
    pub async fn update_role(
        &self,
        actor: &Actor,
        membership_id: &MembershipId,
        new_role: OrgRole,
    ) -> Result<Membership, DomainError> {
        info!(
            actor = %actor.user_id,
            membership = %membership_id,
            role = %new_role,
            "Updating member role"
        );

        let target = self.require_active_membership(membership_id).await?;

        self.access
            .authorize(actor, target.org_id(), &[OrgRole::Owner])
            .await?;

        if target.belongs_to(&actor.user_id) {
            return Err(DomainError::self_action_denied(
                "Actors may not change their own role",
            ));
        }

        // Optimistic last-owner check; the store repeats it under the
        // write transaction.
        if target.role().is_owner() && !new_role.is_owner() {
            self.require_second_owner(target.org_id()).await?;
        }

        self.memberships.update_role(membership_id, new_role).await
    }

    /// Remove a member from an organisation (soft delete).
    ///
    /// Members may always remove themselves; removing someone else takes
    /// an Owner or Admin actor, and Admins may not remove Owners. Either
    /// way the organisation's last owner may not be removed.
    pub async fn remove_member(
        &self,
        actor: &Actor,
        membership_id: &MembershipId,
    ) -> Result<Membership, DomainError> {
        info!(actor = %actor.user_id, membership = %membership_id, "Removing member");

        let target = self.require_active_membership(membership_id).await?;

        let self_removal = target.belongs_to(&actor.user_id);
        if !self_removal {
            let grant = self
                .access
                .authorize(actor, target.org_id(), &[OrgRole::Owner, OrgRole::Admin])
                .await?;

            if grant.role() == Some(OrgRole::Admin) && target.role().is_owner() {
                return Err(DomainError::forbidden_cross_role(
                    "Admins may not remove owners",
                ));
            }
        }

        if target.role().is_owner() {
            self.require_second_owner(target.org_id()).await?;
        }

        self.memberships.soft_delete(membership_id).await
    }

    /// List an organisation's active memberships, newest first.
    ///
    /// Visible to any member of the organisation and to super-admins.
    pub async fn list_members(
        &self,
        actor: &Actor,
        org_id: &OrgId,
    ) -> Result<Vec<Membership>, DomainError> {
        self.require_membership_visibility(actor, org_id).await?;
        self.memberships.list_active(org_id).await
    }

    /// Count an organisation's active memberships
    pub async fn count_members(&self, actor: &Actor, org_id: &OrgId) -> Result<usize, DomainError> {
        self.require_membership_visibility(actor, org_id).await?;
        Ok(self.memberships.list_active(org_id).await?.len())
    }

    /// Count an organisation's active memberships holding a role
    pub async fn count_members_with_role(
        &self,
        actor: &Actor,
        org_id: &OrgId,
        role: OrgRole,
    ) -> Result<usize, DomainError> {
        self.require_membership_visibility(actor, org_id).await?;
        self.memberships.count_active_with_role(org_id, role).await
    }

    async fn require_membership_visibility(
        &self,
        actor: &Actor,
        org_id: &OrgId,
    ) -> Result<AccessGrant, DomainError> {
        self.access
            .authorize(
                actor,
                org_id,
                &[OrgRole::Owner, OrgRole::Admin, OrgRole::Member],
            )
            .await
    }

    async fn require_addressable_org(&self, org_id: &OrgId) -> Result<(), DomainError> {
        let org = self
            .organizations
            .lookup(org_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Organization '{}' not found", org_id)))?;

        if !org.is_addressable() {
            return Err(DomainError::not_found(format!(
                "Organization '{}' not found",
                org_id
            )));
        }

        Ok(())
    }

    async fn require_addable_user(&self, user_id: &UserId) -> Result<(), DomainError> {
        let user = self
            .users
            .lookup(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", user_id)))?;

        if !user.is_addable() {
            return Err(DomainError::validation(format!(
                "User '{}' is not active",
                user_id
            )));
        }

        Ok(())
    }

    async fn require_active_membership(
        &self,
        id: &MembershipId,
    ) -> Result<Membership, DomainError> {
        self.memberships
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))
    }

    async fn require_second_owner(&self, org_id: &OrgId) -> Result<(), DomainError> {
        let owners = self
            .memberships
            .count_active_with_role(org_id, OrgRole::Owner)
            .await?;

        if owners <= 1 {
            return Err(DomainError::last_owner(format!(
                "Organization '{}' would be left without an owner",
                org_id
            )));
        }

        Ok(())
    }
}
