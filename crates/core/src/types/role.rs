//! User roles and capability checks.

use serde::{Deserialize, Serialize};

/// Role assigned to a user account.
///
/// The wire format still exposes an `isAdmin` boolean for client
/// compatibility; internally every authorization decision goes through the
/// capability methods on this enum so further roles can be added without
/// touching call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "text", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A shopper: may review products, place orders, and manage their profile.
    #[default]
    Customer,
    /// Full access to catalog, user, and order management.
    Admin,
}

impl Role {
    /// Whether this role may create, update, and delete catalog entries,
    /// manage users, and view every order.
    #[must_use]
    pub const fn can_manage_store(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Whether this role is an administrator.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_checks() {
        assert!(Role::Admin.can_manage_store());
        assert!(!Role::Customer.can_manage_store());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
    }

    #[test]
    fn round_trips_through_strings() {
        for role in [Role::Customer, Role::Admin] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"customer\"").unwrap(),
            Role::Customer
        );
    }
}
