//! Caller identity and role-gated permissions.
//!
//! Credentials are verified upstream; the engine only receives an [`Actor`]
//! and decides whether its [`Role`] may perform an operation on a center.

use crate::center::Center;
use crate::error::ReliefError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller role supplied by the authentication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Member of the public
    Citizen,
    /// Government coordinator
    Government,
    /// Staff of a rescue center
    RescueCenter,
    /// Platform administrator
    Admin,
}

impl Role {
    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Government => "government",
            Self::RescueCenter => "rescue-center",
            Self::Admin => "admin",
        }
    }

    /// Government and admin callers may act on every center.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Government | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Self::Citizen),
            "government" => Ok(Self::Government),
            "rescue-center" | "rescue_center" | "rescuecenter" => Ok(Self::RescueCenter),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Create a center
    CreateCenter,
    /// Edit, delete or restock a center
    ManageCenter,
    /// Admit, edit, discharge or delete a guest at a center
    ManageGuests,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Who is calling
    pub user_id: UserId,
    /// In which role
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role,
        }
    }

    /// Checks `permission` against an optional target center.
    ///
    /// Government and admin callers may do everything. Rescue-center callers
    /// may create centers and may manage only the centers they manage.
    /// Citizens are read-only.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Forbidden`] when the role is insufficient.
    pub fn authorize(&self, permission: Permission, center: Option<&Center>) -> Result<(), ReliefError> {
        let allowed = match (self.role, permission) {
            (role, _) if role.is_privileged() => true,
            (Role::RescueCenter, Permission::CreateCenter) => true,
            (Role::RescueCenter, Permission::ManageCenter | Permission::ManageGuests) => {
                center.is_some_and(|c| c.is_managed_by(&self.user_id))
            }
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(ReliefError::Forbidden(format!(
                "role '{}' may not perform {permission:?}",
                self.role
            )))
        }
    }

    /// Transfer is allowed when the caller may manage guests at either end.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Forbidden`] when neither center is manageable.
    pub fn authorize_transfer(&self, source: Option<&Center>, target: &Center) -> Result<(), ReliefError> {
        self.authorize(Permission::ManageGuests, Some(target))
            .or_else(|_| self.authorize(Permission::ManageGuests, source))
    }
}
