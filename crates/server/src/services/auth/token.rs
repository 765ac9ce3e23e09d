//! Bearer token issuance and verification (HS256 JWT).

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use food_delivery_core::UserId;

use super::AuthError;
use crate::config::AuthConfig;

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID as a decimal string.
    pub sub: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issuer.
    pub iss: String,
}

impl Claims {
    /// The user this token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenInvalid` if `sub` is not a user ID.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::TokenInvalid("subject is not a user id".to_string()))
    }
}

/// Signing and verification keys, built once from configuration.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("keys", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenKeys {
    /// Build keys from the auth configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            ttl_secs: i64::try_from(config.token_ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenInvalid` if encoding fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
            iss: self.issuer.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenInvalid(format!("encode: {e}")))
    }

    /// Verify signature, expiry and issuer, returning the claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` for expired tokens and
    /// `AuthError::TokenInvalid` for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid(e.to_string()),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn config(secret: &str, issuer: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from(secret.to_string()),
            token_ttl: Duration::from_secs(1800),
            issuer: issuer.to_string(),
        }
    }

    const SECRET: &str = "k8Jq2vXz9LmP4rT7wB1nC6yH3sD5fG0a";

    #[test]
    fn test_roundtrip() {
        let keys = TokenKeys::new(&config(SECRET, "food-delivery"));
        let token = keys.issue(UserId::new(7)).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(7));
        assert_eq!(claims.iss, "food-delivery");
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn test_expired_token() {
        let keys = TokenKeys::new(&config(SECRET, "food-delivery"));
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "7".to_string(),
            iat: now - 3600,
            exp: now - 60,
            iss: "food-delivery".to_string(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(keys.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_issuer_or_secret() {
        let keys = TokenKeys::new(&config(SECRET, "food-delivery"));

        let other_issuer = TokenKeys::new(&config(SECRET, "someone-else"));
        let token = other_issuer.issue(UserId::new(1)).unwrap();
        assert!(matches!(
            keys.verify(&token),
            Err(AuthError::TokenInvalid(_))
        ));

        let other_secret = TokenKeys::new(&config("Zx8Vb3Nm6Qw1Er4Ty7Ui0Op2As5Df9Gh", "food-delivery"));
        let token = other_secret.issue(UserId::new(1)).unwrap();
        assert!(matches!(
            keys.verify(&token),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_garbage_token() {
        let keys = TokenKeys::new(&config(SECRET, "food-delivery"));
        assert!(matches!(
            keys.verify("not.a.jwt"),
            Err(AuthError::TokenInvalid(_))
        ));
    }
}
