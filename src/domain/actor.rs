//! Actor identity
//!
//! The caller identity every authorization decision and lifecycle operation
//! receives. The super-admin flag is a global privilege resolved by the
//! embedding application's authentication layer, not a per-tenant role.

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// An authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// The acting user
    pub user_id: UserId,
    /// Global super-administrator bypass
    pub super_admin: bool,
}

impl Actor {
    /// Create a regular actor
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            super_admin: false,
        }
    }

    /// Create a super-administrator actor
    pub fn super_admin(user_id: UserId) -> Self {
        Self {
            user_id,
            super_admin: true,
        }
    }
}
