//! User and authentication route handlers.
//!
//! Registration, login, logout, profile self-service, and admin user
//! management. Successful register/login responses carry the session token
//! in an httpOnly `jwt` cookie; the same token is also accepted from the
//! `Authorization: Bearer` header.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use clementine_core::{Patch, UserId, parse_id};

use crate::error::{AppError, Result};
use crate::middleware::{AUTH_COOKIE, CurrentAdmin, CurrentUser};
use crate::models::User;
use crate::services::AuthService;
use crate::services::auth::{AdminUserUpdate, ProfileUpdate};
use crate::state::AppState;

/// User routes, mounted under `/api/users`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(register).get(list_users))
        .route("/auth", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

// =============================================================================
// Wire Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Profile self-update request body: tri-state per field.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub username: Patch<String>,
    #[serde(default)]
    pub email: Patch<String>,
    #[serde(default)]
    pub password: Patch<String>,
}

/// Admin user-edit request body: tri-state per field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdateRequest {
    #[serde(default)]
    pub username: Patch<String>,
    #[serde(default)]
    pub email: Patch<String>,
    #[serde(default)]
    pub is_admin: Patch<bool>,
}

/// User response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.to_string(),
            is_admin: user.is_admin(),
        }
    }
}

fn user_id(raw: &str) -> Result<UserId> {
    parse_id(raw).ok_or_else(|| AppError::NotFound("User not found".to_owned()))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        AppError::Validation(format!(
            "Please fill all required fields: '{field}' is missing"
        ))
    })
}

// =============================================================================
// Cookies
// =============================================================================

/// Build the `Set-Cookie` value carrying the session token.
fn auth_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the `Set-Cookie` value that clears the session cookie.
fn clear_auth_cookie(secure: bool) -> String {
    auth_cookie("", 0, secure)
}

// =============================================================================
// Registration & Login
// =============================================================================

/// POST /api/users - Register a new account.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let username = required(body.username, "username")?;
    let email = required(body.email, "email")?;
    let password = required(body.password, "password")?;

    let user = AuthService::new(state.pool())
        .register(&username, &email, &password)
        .await?;

    let token = state
        .tokens()
        .generate(user.id)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let cookie = auth_cookie(
        &token,
        state.tokens().ttl_seconds(),
        state.config().cookie_secure,
    );

    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(UserResponse::from(&user)),
    ))
}

/// POST /api/users/auth - Login with email and password.
///
/// A wrong password and an unknown email produce the same 401 response.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let email = required(body.email, "email")?;
    let password = required(body.password, "password")?;

    let user = AuthService::new(state.pool()).login(&email, &password).await?;

    let token = state
        .tokens()
        .generate(user.id)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let cookie = auth_cookie(
        &token,
        state.tokens().ttl_seconds(),
        state.config().cookie_secure,
    );

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(UserResponse::from(&user)),
    ))
}

/// POST /api/users/logout - Clear the session cookie.
pub async fn logout(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse> {
    let cookie = clear_auth_cookie(state.config().cookie_secure);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({ "message": "Logged out successfully" })),
    ))
}

// =============================================================================
// Profile Self-Service
// =============================================================================

/// GET /api/users/profile - The caller's own account.
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// PUT /api/users/profile - Update the caller's own name/email/password.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ProfileUpdateRequest>,
) -> Result<Json<UserResponse>> {
    let updated = AuthService::new(state.pool())
        .update_profile(
            user.id,
            ProfileUpdate {
                username: body.username,
                email: body.email,
                password: body.password,
            },
        )
        .await?;

    Ok(Json(UserResponse::from(&updated)))
}

// =============================================================================
// Admin User Management
// =============================================================================

/// GET /api/users - List every user (admin).
pub async fn list_users(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<Vec<UserResponse>>> {
    let users = AuthService::new(state.pool()).list_users().await?;

    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// GET /api/users/:id - Fetch a user (admin).
pub async fn get_user(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let id = user_id(&id)?;

    let user = AuthService::new(state.pool())
        .get_user(id)
        .await
        .map_err(|_| AppError::NotFound("User not found".to_owned()))?;

    Ok(Json(UserResponse::from(&user)))
}

/// PUT /api/users/:id - Edit a user (admin).
pub async fn update_user(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
    Json(body): Json<AdminUserUpdateRequest>,
) -> Result<Json<UserResponse>> {
    let id = user_id(&id)?;

    let updated = AuthService::new(state.pool())
        .admin_update_user(
            id,
            AdminUserUpdate {
                username: body.username,
                email: body.email,
                is_admin: body.is_admin,
            },
        )
        .await
        .map_err(|e| match e {
            crate::services::AuthError::UserNotFound => {
                AppError::NotFound("User not found".to_owned())
            }
            other => other.into(),
        })?;

    Ok(Json(UserResponse::from(&updated)))
}

/// DELETE /api/users/:id - Delete a user (admin).
///
/// Admin accounts are not deletable through this path.
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = user_id(&id)?;

    AuthService::new(state.pool())
        .delete_user(id)
        .await
        .map_err(|e| match e {
            crate::services::AuthError::UserNotFound => {
                AppError::NotFound("User not found".to_owned())
            }
            other => other.into(),
        })?;

    Ok(Json(json!({ "message": "User removed" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_cookie_shape() {
        let cookie = auth_cookie("tok.en", 3600, false);
        assert_eq!(
            cookie,
            "jwt=tok.en; Path=/; HttpOnly; SameSite=Strict; Max-Age=3600"
        );
    }

    #[test]
    fn secure_flag_appended() {
        let cookie = auth_cookie("t", 60, true);
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn clearing_cookie_expires_immediately() {
        let cookie = clear_auth_cookie(false);
        assert!(cookie.starts_with("jwt=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
