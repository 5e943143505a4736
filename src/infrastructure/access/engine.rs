//! Authorization engine
//!
//! Answers "may this actor perform an action requiring one of these roles
//! in this organisation". Pure read side: a super-admin check, one
//! membership lookup, and an exact-set role test. No caching - every call
//! re-reads the store, so a committed membership mutation is visible to
//! the next decision immediately.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{Actor, DomainError, Membership, MembershipRepository, OrgId, OrgRole};

/// A successful authorization decision
#[derive(Debug, Clone)]
pub enum AccessGrant {
    /// Allowed through the global super-administrator bypass; no
    /// per-tenant membership was resolved
    SuperAdmin,
    /// Allowed via an active membership in the target organisation
    Membership(Membership),
}

impl AccessGrant {
    /// The actor's resolved role in the organisation, `None` when the
    /// decision came from the super-admin bypass
    pub fn role(&self) -> Option<OrgRole> {
        match self {
            Self::SuperAdmin => None,
            Self::Membership(m) => Some(m.role()),
        }
    }

    /// The resolved membership, if any
    pub fn membership(&self) -> Option<&Membership> {
        match self {
            Self::SuperAdmin => None,
            Self::Membership(m) => Some(m),
        }
    }
}

/// Read-side authorization decisions over the membership store
#[derive(Debug, Clone)]
pub struct AccessEngine {
    memberships: Arc<dyn MembershipRepository>,
}

impl AccessEngine {
    pub fn new(memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { memberships }
    }

    /// Authorize `actor` against `org_id` for an action permitted to
    /// `required_any_of`.
    ///
    /// The role test is exact set membership, not ">=": callers pass the
    /// complete allowed set for the operation. On success the resolved
    /// membership is returned so callers can run cross-actor checks
    /// against a target membership's role.
    pub async fn authorize(
        &self,
        actor: &Actor,
        org_id: &OrgId,
        required_any_of: &[OrgRole],
    ) -> Result<AccessGrant, DomainError> {
        if actor.super_admin {
            debug!(actor = %actor.user_id, org = %org_id, "Authorized via super-admin bypass");
            return Ok(AccessGrant::SuperAdmin);
        }

        let membership = self
            .memberships
            .find_active(&actor.user_id, org_id)
            .await?
            .ok_or_else(|| {
                DomainError::no_access(format!(
                    "User '{}' has no active membership in organization '{}'",
                    actor.user_id, org_id
                ))
            })?;

        if !required_any_of.contains(&membership.role()) {
            return Err(DomainError::insufficient_role(format!(
                "Role '{}' is not permitted for this action in organization '{}'",
                membership.role(),
                org_id
            )));
        }

        debug!(
            actor = %actor.user_id,
            org = %org_id,
            role = %membership.role(),
            "Authorized via membership"
        );

        Ok(AccessGrant::Membership(membership))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::infrastructure::membership::InMemoryMembershipRepository;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn oid(s: &str) -> OrgId {
        OrgId::new(s).unwrap()
    }

    async fn engine_with(
        members: &[(&str, &str, OrgRole)],
    ) -> (AccessEngine, Arc<InMemoryMembershipRepository>) {
        let repo = Arc::new(InMemoryMembershipRepository::new());
        for (user, org, role) in members {
            repo.insert(uid(user), oid(org), *role).await.unwrap();
        }
        (AccessEngine::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_authorize_super_admin_bypass() {
        let (engine, _) = engine_with(&[]).await;
        let actor = Actor::super_admin(uid("root"));

        let grant = engine
            .authorize(&actor, &oid("org-1"), &[OrgRole::Owner])
            .await
            .unwrap();

        assert!(matches!(grant, AccessGrant::SuperAdmin));
        assert!(grant.role().is_none());
        assert!(grant.membership().is_none());
    }

    #[tokio::test]
    async fn test_authorize_no_membership() {
        let (engine, _) = engine_with(&[("u1", "org-1", OrgRole::Owner)]).await;
        let actor = Actor::new(uid("u2"));

        let result = engine
            .authorize(&actor, &oid("org-1"), &[OrgRole::Member])
            .await;

        assert!(matches!(result, Err(DomainError::NoAccess { .. })));
    }

    #[tokio::test]
    async fn test_authorize_insufficient_role() {
        let (engine, _) = engine_with(&[("u1", "org-1", OrgRole::Member)]).await;
        let actor = Actor::new(uid("u1"));

        let result = engine
            .authorize(&actor, &oid("org-1"), &[OrgRole::Owner, OrgRole::Admin])
            .await;

        assert!(matches!(result, Err(DomainError::InsufficientRole { .. })));
    }

    #[tokio::test]
    async fn test_authorize_exact_set_not_threshold() {
        // Owner is not in the allowed set {Admin}; exact membership means deny
        let (engine, _) = engine_with(&[("u1", "org-1", OrgRole::Owner)]).await;
        let actor = Actor::new(uid("u1"));

        let result = engine
            .authorize(&actor, &oid("org-1"), &[OrgRole::Admin])
            .await;

        assert!(matches!(result, Err(DomainError::InsufficientRole { .. })));
    }

    #[tokio::test]
    async fn test_authorize_resolves_membership() {
        let (engine, _) = engine_with(&[("u1", "org-1", OrgRole::Admin)]).await;
        let actor = Actor::new(uid("u1"));

        let grant = engine
            .authorize(&actor, &oid("org-1"), &[OrgRole::Owner, OrgRole::Admin])
            .await
            .unwrap();

        assert_eq!(grant.role(), Some(OrgRole::Admin));
        assert_eq!(grant.membership().unwrap().user_id().as_str(), "u1");
    }

    #[tokio::test]
    async fn test_authorize_ignores_soft_deleted_membership() {
        let (engine, repo) = engine_with(&[
            ("u1", "org-1", OrgRole::Owner),
            ("u2", "org-1", OrgRole::Admin),
        ])
        .await;

        let m = repo
            .find_active(&uid("u2"), &oid("org-1"))
            .await
            .unwrap()
            .unwrap();
        repo.soft_delete(&m.id()).await.unwrap();

        let actor = Actor::new(uid("u2"));
        let result = engine
            .authorize(&actor, &oid("org-1"), &[OrgRole::Admin])
            .await;

        assert!(matches!(result, Err(DomainError::NoAccess { .. })));
    }
}
