//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! clementine-cli admin create -u "Store Admin" -e admin@example.com -p <password>
//! ```
//!
//! # Environment Variables
//!
//! - `CLEMENTINE_DATABASE_URL` - `PostgreSQL` connection string

use clementine_api::services::AuthService;

/// Create a new admin user.
///
/// # Arguments
///
/// * `username` - Admin's display name
/// * `email` - Admin's email address
/// * `password` - Admin's password (hashed before storage)
///
/// # Errors
///
/// Returns an error if the email is taken, the password is too weak, or a
/// database operation fails.
pub async fn create_user(
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let user = AuthService::new(&pool)
        .create_admin(username, email, password)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "admin user created");
    Ok(())
}
