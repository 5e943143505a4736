use thiserror::Error;

/// Core domain errors
///
/// Every variant is a terminal, caller-visible outcome. The embedding
/// application maps these onto its transport (403/404/409 style responses);
/// nothing here is retried except transient storage failures, which the
/// Postgres repository retries internally before surfacing `Storage`.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid ID format: {message}")]
    InvalidId { message: String },

    #[error("No access: {message}")]
    NoAccess { message: String },

    #[error("Insufficient role: {message}")]
    InsufficientRole { message: String },

    #[error("Forbidden cross-role action: {message}")]
    ForbiddenCrossRole { message: String },

    #[error("Self action denied: {message}")]
    SelfActionDenied { message: String },

    #[error("Last owner: {message}")]
    LastOwner { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    pub fn no_access(message: impl Into<String>) -> Self {
        Self::NoAccess {
            message: message.into(),
        }
    }

    pub fn insufficient_role(message: impl Into<String>) -> Self {
        Self::InsufficientRole {
            message: message.into(),
        }
    }

    pub fn forbidden_cross_role(message: impl Into<String>) -> Self {
        Self::ForbiddenCrossRole {
            message: message.into(),
        }
    }

    pub fn self_action_denied(message: impl Into<String>) -> Self {
        Self::SelfActionDenied {
            message: message.into(),
        }
    }

    pub fn last_owner(message: impl Into<String>) -> Self {
        Self::LastOwner {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
