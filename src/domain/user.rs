//! User references
//!
//! Users are owned by the embedding application; the core only needs an
//! opaque, validated identifier and the "may this user be added to an
//! organisation" predicate (exists and is active), answered through the
//! [`UserDirectory`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DomainError;

/// Errors that can occur during user ID validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("User ID cannot be empty")]
    EmptyId,

    #[error("User ID cannot exceed {0} characters")]
    IdTooLong(usize),

    #[error("User ID can only contain alphanumeric characters and hyphens")]
    InvalidIdCharacters,

    #[error("User ID cannot start or end with a hyphen")]
    InvalidIdFormat,
}

const MAX_USER_ID_LENGTH: usize = 50;

/// Validate a user ID
pub fn validate_user_id(id: &str) -> Result<(), UserValidationError> {
    if id.is_empty() {
        return Err(UserValidationError::EmptyId);
    }

    if id.len() > MAX_USER_ID_LENGTH {
        return Err(UserValidationError::IdTooLong(MAX_USER_ID_LENGTH));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(UserValidationError::InvalidIdCharacters);
    }

    if id.starts_with('-') || id.ends_with('-') {
        return Err(UserValidationError::InvalidIdFormat);
    }

    Ok(())
}

/// User identifier - alphanumeric + hyphens, max 50 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, UserValidationError> {
        let id = id.into();
        validate_user_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// User is active
    #[default]
    Active,
    /// User is temporarily suspended
    Suspended,
}

impl UserStatus {
    /// Check if the user is active
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// The slice of a user the membership core needs to see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub status: UserStatus,
}

impl UserRecord {
    pub fn new(id: UserId, status: UserStatus) -> Self {
        Self { id, status }
    }

    /// Check if this user may be added to an organisation
    pub fn is_addable(&self) -> bool {
        self.status.is_active()
    }
}

/// Lookup into the externally owned user store
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Resolve a user by ID, `None` if the user does not exist
    async fn lookup(&self, id: &UserId) -> Result<Option<UserRecord>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_valid() {
        let id = UserId::new("u1").unwrap();
        assert_eq!(id.as_str(), "u1");
    }

    #[test]
    fn test_user_id_with_hyphens() {
        let id = UserId::new("user-123").unwrap();
        assert_eq!(id.as_str(), "user-123");
    }

    #[test]
    fn test_user_id_invalid() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("-user").is_err());
        assert!(UserId::new("user-").is_err());
        assert!(UserId::new("user_name").is_err());
        assert!(UserId::new("a".repeat(51)).is_err());
    }

    #[test]
    fn test_user_status() {
        assert!(UserStatus::Active.is_active());
        assert!(!UserStatus::Suspended.is_active());
    }

    #[test]
    fn test_user_record_addable() {
        let active = UserRecord::new(UserId::new("u1").unwrap(), UserStatus::Active);
        assert!(active.is_addable());

        let suspended = UserRecord::new(UserId::new("u2").unwrap(), UserStatus::Suspended);
        assert!(!suspended.is_addable());
    }
}
