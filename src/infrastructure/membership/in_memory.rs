//! In-memory membership repository
//!
//! Useful for testing and development. Each mutating operation performs its
//! invariant re-check and the write under a single write-lock acquisition,
//! which stands in for the backend transaction: two concurrent removals of
//! an organisation's owners serialize here exactly as they would on row
//! locks in PostgreSQL.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{
    DomainError, Membership, MembershipId, MembershipRepository, OrgId, OrgRole, UserId,
};

/// Thread-safe in-memory implementation of [`MembershipRepository`]
#[derive(Debug, Default)]
pub struct InMemoryMembershipRepository {
    memberships: RwLock<HashMap<MembershipId, Membership>>,
}

impl InMemoryMembershipRepository {
    /// Creates a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    fn active_owner_count(map: &HashMap<MembershipId, Membership>, org_id: &OrgId) -> usize {
        map.values()
            .filter(|m| m.org_id() == org_id && m.is_active() && m.role().is_owner())
            .count()
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn find_active(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<Membership>, DomainError> {
        let map = self
            .memberships
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(map
            .values()
            .find(|m| m.belongs_to(user_id) && m.org_id() == org_id && m.is_active())
            .cloned())
    }

    async fn find_active_by_id(
        &self,
        id: &MembershipId,
    ) -> Result<Option<Membership>, DomainError> {
        let map = self
            .memberships
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(map.get(id).filter(|m| m.is_active()).cloned())
    }

    async fn find_pair(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<Membership>, DomainError> {
        let map = self
            .memberships
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        // Prefer the active row; fall back to the most recently updated
        // soft-deleted one.
        let mut candidates: Vec<&Membership> = map
            .values()
            .filter(|m| m.belongs_to(user_id) && m.org_id() == org_id)
            .collect();
        candidates.sort_by_key(|m| (m.is_active(), m.updated_at()));

        Ok(candidates.last().cloned().cloned())
    }

    async fn list_active(&self, org_id: &OrgId) -> Result<Vec<Membership>, DomainError> {
        let map = self
            .memberships
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut result: Vec<Membership> = map
            .values()
            .filter(|m| m.org_id() == org_id && m.is_active())
            .cloned()
            .collect();

        // Newest first
        result.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(result)
    }

    async fn count_active_with_role(
        &self,
        org_id: &OrgId,
        role: OrgRole,
    ) -> Result<usize, DomainError> {
        let map = self
            .memberships
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(map
            .values()
            .filter(|m| m.org_id() == org_id && m.is_active() && m.role() == role)
            .count())
    }

    async fn insert(
        &self,
        user_id: UserId,
        org_id: OrgId,
        role: OrgRole,
    ) -> Result<Membership, DomainError> {
        let mut map = self
            .memberships
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        // Binding uniqueness check, under the same lock as the write
        if map
            .values()
            .any(|m| m.belongs_to(&user_id) && m.org_id() == &org_id && m.is_active())
        {
            return Err(DomainError::conflict(format!(
                "User '{}' is already a member of organization '{}'",
                user_id, org_id
            )));
        }

        let membership = Membership::new(user_id, org_id, role);
        map.insert(membership.id(), membership.clone());

        Ok(membership)
    }

    async fn restore(&self, id: &MembershipId, role: OrgRole) -> Result<Membership, DomainError> {
        let mut map = self
            .memberships
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let membership = map
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))?;

        if membership.is_active() {
            return Err(DomainError::conflict(format!(
                "Membership '{}' is not soft-deleted",
                id
            )));
        }

        membership.restore(role);
        Ok(membership.clone())
    }

    async fn update_role(
        &self,
        id: &MembershipId,
        role: OrgRole,
    ) -> Result<Membership, DomainError> {
        let mut map = self
            .memberships
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let current = map
            .get(id)
            .filter(|m| m.is_active())
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))?;

        // Binding owner-count check: an owner demotion must leave at least
        // one active owner behind.
        if current.role().is_owner()
            && !role.is_owner()
            && Self::active_owner_count(&map, current.org_id()) <= 1
        {
            return Err(DomainError::last_owner(format!(
                "Organization '{}' would be left without an owner",
                current.org_id()
            )));
        }

        let membership = map.get_mut(id).ok_or_else(|| {
            DomainError::not_found(format!("Membership '{}' not found", id))
        })?;
        membership.set_role(role);

        Ok(membership.clone())
    }

    async fn soft_delete(&self, id: &MembershipId) -> Result<Membership, DomainError> {
        let mut map = self
            .memberships
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let current = map
            .get(id)
            .filter(|m| m.is_active())
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))?;

        if current.role().is_owner()
            && Self::active_owner_count(&map, current.org_id()) <= 1
        {
            return Err(DomainError::last_owner(format!(
                "Organization '{}' would be left without an owner",
                current.org_id()
            )));
        }

        let membership = map.get_mut(id).ok_or_else(|| {
            DomainError::not_found(format!("Membership '{}' not found", id))
        })?;
        membership.soft_delete();

        Ok(membership.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn oid(s: &str) -> OrgId {
        OrgId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryMembershipRepository::new();

        let m = repo
            .insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();

        let found = repo.find_active(&uid("u1"), &oid("org-1")).await.unwrap();
        assert_eq!(found.unwrap().id(), m.id());

        let by_id = repo.find_active_by_id(&m.id()).await.unwrap();
        assert_eq!(by_id.unwrap().role(), OrgRole::Owner);
    }

    #[tokio::test]
    async fn test_insert_duplicate_active_pair() {
        let repo = InMemoryMembershipRepository::new();

        repo.insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();

        let result = repo.insert(uid("u1"), oid("org-1"), OrgRole::Member).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_insert_same_user_different_orgs() {
        let repo = InMemoryMembershipRepository::new();

        repo.insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        repo.insert(uid("u1"), oid("org-2"), OrgRole::Member)
            .await
            .unwrap();

        assert!(repo
            .find_active(&uid("u1"), &oid("org-2"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_count_active_with_role() {
        let repo = InMemoryMembershipRepository::new();

        repo.insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        repo.insert(uid("u2"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        repo.insert(uid("u3"), oid("org-1"), OrgRole::Member)
            .await
            .unwrap();

        assert_eq!(
            repo.count_active_with_role(&oid("org-1"), OrgRole::Owner)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            repo.count_active_with_role(&oid("org-1"), OrgRole::Admin)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_list_active_newest_first() {
        let repo = InMemoryMembershipRepository::new();

        let first = repo
            .insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = repo
            .insert(uid("u2"), oid("org-1"), OrgRole::Member)
            .await
            .unwrap();

        let listed = repo.list_active(&oid("org-1")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id(), second.id());
        assert_eq!(listed[1].id(), first.id());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_membership() {
        let repo = InMemoryMembershipRepository::new();

        repo.insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        let m = repo
            .insert(uid("u2"), oid("org-1"), OrgRole::Member)
            .await
            .unwrap();

        repo.soft_delete(&m.id()).await.unwrap();

        assert!(repo
            .find_active(&uid("u2"), &oid("org-1"))
            .await
            .unwrap()
            .is_none());
        assert!(repo.find_active_by_id(&m.id()).await.unwrap().is_none());

        // find_pair still sees the soft-deleted row
        let pair = repo.find_pair(&uid("u2"), &oid("org-1")).await.unwrap();
        assert!(pair.unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_soft_delete_last_owner_rejected() {
        let repo = InMemoryMembershipRepository::new();

        let owner = repo
            .insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();

        let result = repo.soft_delete(&owner.id()).await;
        assert!(matches!(result, Err(DomainError::LastOwner { .. })));

        // still active
        assert!(repo.find_active_by_id(&owner.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_soft_delete_owner_with_second_owner() {
        let repo = InMemoryMembershipRepository::new();

        let owner1 = repo
            .insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        repo.insert(uid("u2"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();

        let deleted = repo.soft_delete(&owner1.id()).await.unwrap();
        assert!(deleted.is_deleted());
        assert_eq!(
            repo.count_active_with_role(&oid("org-1"), OrgRole::Owner)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_role_demote_last_owner_rejected() {
        let repo = InMemoryMembershipRepository::new();

        let owner = repo
            .insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();

        let result = repo.update_role(&owner.id(), OrgRole::Member).await;
        assert!(matches!(result, Err(DomainError::LastOwner { .. })));
    }

    #[tokio::test]
    async fn test_update_role_promotion() {
        let repo = InMemoryMembershipRepository::new();

        repo.insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        let m = repo
            .insert(uid("u2"), oid("org-1"), OrgRole::Member)
            .await
            .unwrap();

        let updated = repo.update_role(&m.id(), OrgRole::Admin).await.unwrap();
        assert_eq!(updated.role(), OrgRole::Admin);
    }

    #[tokio::test]
    async fn test_restore_soft_deleted() {
        let repo = InMemoryMembershipRepository::new();

        repo.insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();
        let m = repo
            .insert(uid("u2"), oid("org-1"), OrgRole::Admin)
            .await
            .unwrap();

        repo.soft_delete(&m.id()).await.unwrap();
        let restored = repo.restore(&m.id(), OrgRole::Member).await.unwrap();

        assert!(restored.is_active());
        assert_eq!(restored.role(), OrgRole::Member);
        assert_eq!(restored.id(), m.id());
    }

    #[tokio::test]
    async fn test_restore_active_row_rejected() {
        let repo = InMemoryMembershipRepository::new();

        let m = repo
            .insert(uid("u1"), oid("org-1"), OrgRole::Owner)
            .await
            .unwrap();

        let result = repo.restore(&m.id(), OrgRole::Member).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }
}
