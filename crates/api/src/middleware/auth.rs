//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring an authenticated user (or an admin) in
//! route handlers. The session token is accepted from either the
//! `Authorization: Bearer` header or the `jwt` cookie.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// Name of the httpOnly cookie carrying the session token.
pub const AUTH_COOKIE: &str = "jwt";

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     CurrentUser(user): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_owned()))?;

        let claims = state
            .tokens()
            .verify(&token)
            .map_err(|_| AppError::Unauthorized("Not authorized, token failed".to_owned()))?;
        let user_id = claims
            .user_id()
            .map_err(|_| AppError::Unauthorized("Not authorized, token failed".to_owned()))?;

        // The token may outlive the account; reject if the user is gone.
        let user = UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_owned()))?;

        Ok(Self(user))
    }
}

/// Extractor that requires an authenticated administrator.
pub struct CurrentAdmin(pub User);

impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !user.role.can_manage_store() {
            return Err(AppError::Unauthorized(
                "Not authorized as an admin".to_owned(),
            ));
        }

        Ok(Self(user))
    }
}

/// Pull the session token from the request headers.
///
/// The `Authorization: Bearer` header wins over the cookie when both are
/// present.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_owned());
    }

    cookie_value(headers, AUTH_COOKIE)
}

/// Find a cookie's value in the `Cookie` header.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;

    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_header_wins() {
        let mut headers = headers_with(header::AUTHORIZATION, "Bearer abc.def.ghi");
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=cookie-token"));

        assert_eq!(extract_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn falls_back_to_cookie() {
        let headers = headers_with(header::COOKIE, "theme=dark; jwt=cookie-token; lang=en");

        assert_eq!(extract_token(&headers).unwrap(), "cookie-token");
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(extract_token(&HeaderMap::new()), None);

        let headers = headers_with(header::COOKIE, "theme=dark");
        assert_eq!(extract_token(&headers), None);

        let headers = headers_with(header::AUTHORIZATION, "Basic dXNlcjpwYXNz");
        assert_eq!(extract_token(&headers), None);
    }
}
