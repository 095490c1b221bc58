//! Identity service.
//!
//! Registration, credential verification, profile self-service, and admin
//! user management. Passwords are hashed with Argon2id; session tokens are
//! issued by [`crate::services::TokenManager`] at the route layer.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use clementine_core::{Email, Patch, Role, UserId};

use crate::db::RepositoryError;
use crate::db::users::{UserChanges, UserRepository};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Tri-state changes for a profile self-update.
///
/// Every field here is required on the account, so an explicit `null` is an
/// invalid clear request and is rejected rather than conflated with "keep".
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub username: Patch<String>,
    pub email: Patch<String>,
    pub password: Patch<String>,
}

/// Tri-state changes for an admin edit of a user.
#[derive(Debug, Default)]
pub struct AdminUserUpdate {
    pub username: Patch<String>,
    pub email: Patch<String>,
    pub is_admin: Patch<bool>,
}

/// Identity service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new identity service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Registration & Login
    // =========================================================================

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::InvalidField("username"));
        }

        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(username.trim(), &email, &password_hash, Role::Customer)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        Ok(user)
    }

    /// Create an administrator account. Used by the operational CLI; the
    /// HTTP surface has no self-service path to the admin role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn create_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::InvalidField("username"));
        }

        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(username.trim(), &email, &password_hash, Role::Admin)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Verify email and password.
    ///
    /// Unknown email and wrong password collapse into the same
    /// `InvalidCredentials` error so responses carry no enumeration signal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Profile Self-Service
    // =========================================================================

    /// Apply a profile update to the caller's own account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidField` if a field is explicitly null.
    /// Returns `AuthError::UserAlreadyExists` if the new email is taken.
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        let mut changes = UserChanges::default();

        changes.username = required_field(update.username, "username")?;
        if let Some(raw) = required_field(update.email, "email")? {
            changes.email = Some(Email::parse(&raw)?);
        }
        if let Some(password) = required_field(update.password, "password")? {
            validate_password(&password)?;
            changes.password_hash = Some(hash_password(&password)?);
        }

        self.apply_changes(user_id, changes).await
    }

    // =========================================================================
    // Admin User Management
    // =========================================================================

    /// List every registered user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.list_all().await?)
    }

    /// Apply an admin edit to a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidField` if a field is explicitly null.
    /// Returns `AuthError::UserAlreadyExists` if the new email is taken.
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn admin_update_user(
        &self,
        user_id: UserId,
        update: AdminUserUpdate,
    ) -> Result<User, AuthError> {
        let mut changes = UserChanges::default();

        changes.username = required_field(update.username, "username")?;
        if let Some(raw) = required_field(update.email, "email")? {
            changes.email = Some(Email::parse(&raw)?);
        }
        if let Some(is_admin) = required_field(update.is_admin, "isAdmin")? {
            changes.role = Some(if is_admin { Role::Admin } else { Role::Customer });
        }

        self.apply_changes(user_id, changes).await
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    /// Returns `AuthError::CannotDeleteAdmin` for admin accounts.
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), AuthError> {
        let user = self.get_user(user_id).await?;

        if user.role.can_manage_store() {
            return Err(AuthError::CannotDeleteAdmin);
        }

        if !self.users.delete(user_id).await? {
            return Err(AuthError::UserNotFound);
        }

        Ok(())
    }

    async fn apply_changes(
        &self,
        user_id: UserId,
        changes: UserChanges,
    ) -> Result<User, AuthError> {
        self.users
            .update(user_id, changes)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Resolve a tri-state field whose column is NOT NULL: a value passes
/// through, absence keeps the stored value, and an explicit null is rejected.
fn required_field<T>(patch: Patch<T>, name: &'static str) -> Result<Option<T>, AuthError> {
    if patch.is_null() {
        return Err(AuthError::InvalidField(name));
    }
    Ok(patch.into_value())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn password_hashing_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();

        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("same input").unwrap();
        let second = hash_password("same input").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough password").is_ok());
    }

    #[test]
    fn null_field_rejected_missing_kept() {
        assert!(matches!(
            required_field(Patch::<String>::Null, "username"),
            Err(AuthError::InvalidField("username"))
        ));
        assert!(
            required_field(Patch::<String>::Missing, "username")
                .unwrap()
                .is_none()
        );
        assert_eq!(
            required_field(Patch::Value("x".to_owned()), "username").unwrap(),
            Some("x".to_owned())
        );
    }
}
