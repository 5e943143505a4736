//! Organisation references
//!
//! Organisations (tenants) are owned by the embedding application. The core
//! treats them as an opaque, validated identifier plus the "is this
//! organisation addressable" predicate (exists and is not soft-deleted),
//! answered through the [`OrganizationDirectory`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DomainError;

/// Errors that can occur during organisation ID validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrgValidationError {
    #[error("Organization ID cannot be empty")]
    EmptyId,

    #[error("Organization ID cannot exceed {0} characters")]
    IdTooLong(usize),

    #[error("Organization ID can only contain alphanumeric characters and hyphens")]
    InvalidIdCharacters,

    #[error("Organization ID cannot start or end with a hyphen")]
    InvalidIdFormat,
}

const MAX_ORG_ID_LENGTH: usize = 50;

/// Validate an organisation ID
pub fn validate_org_id(id: &str) -> Result<(), OrgValidationError> {
    if id.is_empty() {
        return Err(OrgValidationError::EmptyId);
    }

    if id.len() > MAX_ORG_ID_LENGTH {
        return Err(OrgValidationError::IdTooLong(MAX_ORG_ID_LENGTH));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(OrgValidationError::InvalidIdCharacters);
    }

    if id.starts_with('-') || id.ends_with('-') {
        return Err(OrgValidationError::InvalidIdFormat);
    }

    Ok(())
}

/// Organisation identifier - alphanumeric + hyphens, max 50 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrgId(String);

impl OrgId {
    /// Create a new OrgId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, OrgValidationError> {
        let id = id.into();
        validate_org_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrgId {
    type Error = OrgValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OrgId> for String {
    fn from(id: OrgId) -> Self {
        id.0
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The slice of an organisation the membership core needs to see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: OrgId,
    /// Soft-delete flag; a deleted organisation is not addressable
    pub deleted: bool,
}

impl OrganizationRecord {
    pub fn new(id: OrgId) -> Self {
        Self { id, deleted: false }
    }

    /// Check if this organisation may be the target of membership operations
    pub fn is_addressable(&self) -> bool {
        !self.deleted
    }
}

/// Lookup into the externally owned organisation store
#[async_trait]
pub trait OrganizationDirectory: Send + Sync + std::fmt::Debug {
    /// Resolve an organisation by ID, `None` if it does not exist
    async fn lookup(&self, id: &OrgId) -> Result<Option<OrganizationRecord>, DomainError>;
}
