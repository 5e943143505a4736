//! Organisation role model
//!
//! The closed set of roles a user can hold within an organisation, with a
//! strict total order of privilege: Owner > Admin > Member. There are no
//! custom roles; every authorization decision in the crate is expressed
//! against these three values.

use serde::{Deserialize, Serialize};

/// User role within an organisation.
///
/// # Examples
///
/// ```
/// use engage_core::domain::OrgRole;
///
/// assert!(OrgRole::Owner > OrgRole::Admin);
/// assert!(OrgRole::Admin.at_least(OrgRole::Member));
/// assert!(!OrgRole::Member.can_manage_members());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    /// Regular organisation member
    Member = 1,

    /// Can manage members and organisation resources
    Admin = 2,

    /// Full organisation control
    Owner = 3,
}

impl OrgRole {
    /// Numeric privilege rank: Owner = 3, Admin = 2, Member = 1.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Check if this role has at least the privilege of `threshold`.
    pub fn at_least(&self, threshold: OrgRole) -> bool {
        *self >= threshold
    }

    /// Check if this role can manage organisation members.
    ///
    /// Member management (adding, removing, changing roles) is restricted
    /// to Owner and Admin; the finer cross-role rules live in the
    /// membership lifecycle service.
    pub fn can_manage_members(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// Check if this is the Owner role.
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Parse a role from its string representation (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use engage_core::domain::OrgRole;
    ///
    /// assert_eq!(OrgRole::parse("admin"), Some(OrgRole::Admin));
    /// assert_eq!(OrgRole::parse("OWNER"), Some(OrgRole::Owner));
    /// assert_eq!(OrgRole::parse("viewer"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    /// Lowercase string representation, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
