//! Tenant-scoped resource guard
//!
//! The single integration point for every other resource module (agents,
//! leads, chats, calls, tags): before reading or mutating
//! organisation-scoped data, a handler asks the guard whether the actor
//! holds one of the required roles. The guard carries no policy of its
//! own; it delegates to the access engine.

use crate::domain::{Actor, DomainError, OrgId, OrgRole};

use super::engine::{AccessEngine, AccessGrant};

/// Authorization facade for organisation-scoped resources
#[derive(Debug, Clone)]
pub struct ResourceGuard {
    engine: AccessEngine,
}

impl ResourceGuard {
    pub fn new(engine: AccessEngine) -> Self {
        Self { engine }
    }

    /// Require any of the given roles
    pub async fn require_any(
        &self,
        actor: &Actor,
        org_id: &OrgId,
        required_any_of: &[OrgRole],
    ) -> Result<AccessGrant, DomainError> {
        self.engine.authorize(actor, org_id, required_any_of).await
    }

    /// Require membership in the organisation, any role
    pub async fn require_member(
        &self,
        actor: &Actor,
        org_id: &OrgId,
    ) -> Result<AccessGrant, DomainError> {
        self.require_any(
            actor,
            org_id,
            &[OrgRole::Owner, OrgRole::Admin, OrgRole::Member],
        )
        .await
    }

    /// Require a management role (Owner or Admin)
    pub async fn require_manager(
        &self,
        actor: &Actor,
        org_id: &OrgId,
    ) -> Result<AccessGrant, DomainError> {
        self.require_any(actor, org_id, &[OrgRole::Owner, OrgRole::Admin])
            .await
    }

    /// Require the Owner role
    pub async fn require_owner(
        &self,
        actor: &Actor,
        org_id: &OrgId,
    ) -> Result<AccessGrant, DomainError> {
        self.require_any(actor, org_id, &[OrgRole::Owner]).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{MembershipRepository, UserId};
    use crate::infrastructure::membership::InMemoryMembershipRepository;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn oid(s: &str) -> OrgId {
        OrgId::new(s).unwrap()
    }

    async fn guard_with(members: &[(&str, &str, OrgRole)]) -> ResourceGuard {
        let repo = Arc::new(InMemoryMembershipRepository::new());
        for (user, org, role) in members {
            repo.insert(uid(user), oid(org), *role).await.unwrap();
        }
        ResourceGuard::new(AccessEngine::new(repo))
    }

    #[tokio::test]
    async fn test_require_member_any_role() {
        let guard = guard_with(&[("u1", "org-1", OrgRole::Member)]).await;
        let actor = Actor::new(uid("u1"));

        let grant = guard.require_member(&actor, &oid("org-1")).await.unwrap();
        assert_eq!(grant.role(), Some(OrgRole::Member));
    }

    #[tokio::test]
    async fn test_require_manager_rejects_member() {
        let guard = guard_with(&[("u1", "org-1", OrgRole::Member)]).await;
        let actor = Actor::new(uid("u1"));

        let result = guard.require_manager(&actor, &oid("org-1")).await;
        assert!(matches!(result, Err(DomainError::InsufficientRole { .. })));
    }

    #[tokio::test]
    async fn test_require_owner_rejects_admin() {
        let guard = guard_with(&[("u1", "org-1", OrgRole::Admin)]).await;
        let actor = Actor::new(uid("u1"));

        let result = guard.require_owner(&actor, &oid("org-1")).await;
        assert!(matches!(result, Err(DomainError::InsufficientRole { .. })));
    }

    #[tokio::test]
    async fn test_guard_denies_outsider() {
        let guard = guard_with(&[("u1", "org-1", OrgRole::Owner)]).await;
        let actor = Actor::new(uid("intruder"));

        let result = guard.require_member(&actor, &oid("org-1")).await;
        assert!(matches!(result, Err(DomainError::NoAccess { .. })));
    }
}
