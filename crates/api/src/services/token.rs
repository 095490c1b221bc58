//! Signed session token generation and validation.
//!
//! Tokens are HS256 JWTs carrying the user id as subject plus the standard
//! issued-at/expiry/issuer claims. They are accepted from either the
//! `Authorization: Bearer` header or the `jwt` cookie.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clementine_core::UserId;

/// Issuer claim stamped into every token.
const TOKEN_ISSUER: &str = "clementine";

/// Errors from token generation or validation.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token is malformed, has a bad signature, or is expired.
    #[error("invalid token")]
    Invalid,
    /// The token could not be signed.
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        Self::Invalid
    }
}

/// JWT claims for Clementine session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// JWT ID.
    pub jti: String,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(user_id: UserId, ttl_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(i64::try_from(ttl_hours).unwrap_or(i64::MAX));

        Self {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Returns the user ID encoded in the subject claim.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the subject is not a well-formed ID.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }
}

/// Session token manager.
#[derive(Clone)]
pub struct TokenManager {
    ttl_hours: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("ttl_hours", &self.ttl_hours)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a new token manager from the signing secret.
    #[must_use]
    pub fn new(secret: &SecretString, ttl_hours: u64) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();
        Self {
            ttl_hours,
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
        }
    }

    /// Generates a session token for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn generate(&self, user_id: UserId) -> Result<String, TokenError> {
        let claims = Claims::new(user_id, self.ttl_hours);

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Validates a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` on a bad signature, wrong issuer, or
    /// expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[TOKEN_ISSUER]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Token lifetime in seconds, for the cookie `Max-Age`.
    #[must_use]
    pub const fn ttl_seconds(&self) -> u64 {
        self.ttl_hours * 3600
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new(
            &SecretString::from("test-signing-key-with-plenty-of-length"),
            24,
        )
    }

    #[test]
    fn test_generation_and_validation() {
        let manager = manager();
        let user_id = UserId::new(42);

        let token = manager.generate(user_id).unwrap();
        let claims = manager.verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let manager = manager();
        assert!(matches!(
            manager.verify("not-a-token"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager1 = manager();
        let manager2 = TokenManager::new(
            &SecretString::from("a-completely-different-signing-key"),
            24,
        );

        let token = manager1.generate(UserId::new(1)).unwrap();
        assert!(manager2.verify(&token).is_err());
    }

    #[test]
    fn test_ttl_seconds() {
        assert_eq!(manager().ttl_seconds(), 24 * 3600);
    }
}
