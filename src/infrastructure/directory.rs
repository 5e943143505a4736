//! In-memory directory adapters
//!
//! Users and organisations are owned by the embedding application; these
//! adapters let tests - and embedders that already hold that state in
//! memory - satisfy the directory traits without a database.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{
    DomainError, OrgId, OrganizationDirectory, OrganizationRecord, UserDirectory, UserId,
    UserRecord, UserStatus,
};

/// Thread-safe in-memory implementation of [`UserDirectory`]
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active user
    pub fn add_active(&self, id: UserId) {
        let record = UserRecord::new(id.clone(), UserStatus::Active);
        self.users.write().unwrap().insert(id, record);
    }

    /// Register a suspended user
    pub fn add_suspended(&self, id: UserId) {
        let record = UserRecord::new(id.clone(), UserStatus::Suspended);
        self.users.write().unwrap().insert(id, record);
    }

    /// Change a user's status
    pub fn set_status(&self, id: &UserId, status: UserStatus) {
        if let Some(record) = self.users.write().unwrap().get_mut(id) {
            record.status = status;
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn lookup(&self, id: &UserId) -> Result<Option<UserRecord>, DomainError> {
        let users = self
            .users
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(users.get(id).cloned())
    }
}

/// Thread-safe in-memory implementation of [`OrganizationDirectory`]
#[derive(Debug, Default)]
pub struct InMemoryOrganizationDirectory {
    organizations: RwLock<HashMap<OrgId, OrganizationRecord>>,
}

impl InMemoryOrganizationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an addressable organisation
    pub fn add(&self, id: OrgId) {
        let record = OrganizationRecord::new(id.clone());
        self.organizations.write().unwrap().insert(id, record);
    }

    /// Soft-delete an organisation
    pub fn mark_deleted(&self, id: &OrgId) {
        if let Some(record) = self.organizations.write().unwrap().get_mut(id) {
            record.deleted = true;
        }
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryOrganizationDirectory {
    async fn lookup(&self, id: &OrgId) -> Result<Option<OrganizationRecord>, DomainError> {
        let organizations = self
            .organizations
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(organizations.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_directory_lookup() {
        let dir = InMemoryUserDirectory::new();
        dir.add_active(UserId::new("u1").unwrap());

        let record = dir.lookup(&UserId::new("u1").unwrap()).await.unwrap();
        assert!(record.unwrap().is_addable());

        let missing = dir.lookup(&UserId::new("u2").unwrap()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_user_directory_suspension() {
        let dir = InMemoryUserDirectory::new();
        let id = UserId::new("u1").unwrap();
        dir.add_active(id.clone());
        dir.set_status(&id, UserStatus::Suspended);

        let record = dir.lookup(&id).await.unwrap().unwrap();
        assert!(!record.is_addable());
    }

    #[tokio::test]
    async fn test_organization_directory_lookup() {
        let dir = InMemoryOrganizationDirectory::new();
        let id = OrgId::new("org-1").unwrap();
        dir.add(id.clone());

        let record = dir.lookup(&id).await.unwrap().unwrap();
        assert!(record.is_addressable());

        dir.mark_deleted(&id);
        let record = dir.lookup(&id).await.unwrap().unwrap();
        assert!(!record.is_addressable());
    }
}
