//! User account model.

use chrono::{DateTime, Utc};

use clementine_core::{Email, Role, UserId};

/// A registered user account.
///
/// The password hash never leaves the repository layer; this struct is safe
/// to hand to handlers and serializers.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this account may use the admin-only API surface.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.can_manage_store()
    }
}
