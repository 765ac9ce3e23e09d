//! Authentication service.
//!
//! Password registration and login, plus bearer token verification for
//! protected routes.

mod error;
mod token;

pub use error::AuthError;
pub use token::{Claims, TokenKeys};

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{debug, info};

use food_delivery_core::{Email, Username};

use crate::db::{RepositoryError, UserStore};
use crate::models::{NewUser, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash verified against when the email is unknown, so a miss costs the same
/// as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password_blocking("timing-equaliser").ok());

/// Registration input as received from the client.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// A user together with a freshly issued access token.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub access_token: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    tokens: &'a TokenKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserStore, tokens: &'a TokenKeys) -> Self {
        Self { users, tokens }
    }

    /// Register a new user and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::InvalidUsername` for
    /// malformed input, `AuthError::WeakPassword` if the password is too short,
    /// and `AuthError::AlreadyExists` if the email or username is taken.
    pub async fn register(&self, input: Registration) -> Result<Authenticated, AuthError> {
        let email = Email::parse(&input.email)?;
        let username = Username::parse(&input.username)?;
        validate_password(&input.password)?;

        if self.users.email_taken(&email).await? {
            return Err(AuthError::AlreadyExists("Email already registered".to_string()));
        }
        if self.users.username_taken(&username).await? {
            return Err(AuthError::AlreadyExists("Username already taken".to_string()));
        }

        let password_hash = hash_password(&input.password).await?;

        // The unique constraints still catch a concurrent registration
        let user = self
            .users
            .create_user(NewUser {
                email,
                username,
                password_hash,
                full_name: non_blank(input.full_name),
                phone: non_blank(input.phone),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(field) => AuthError::AlreadyExists(field),
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "User registered");

        let access_token = self.tokens.issue(user.id)?;
        Ok(Authenticated { user, access_token })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or
    /// malformed, the password is wrong, or the account is inactive.
    pub async fn login(&self, email: &str, password: &str) -> Result<Authenticated, AuthError> {
        let found = match Email::parse(email) {
            Ok(email) => self.users.get_password_hash(&email).await?,
            Err(_) => None,
        };

        let Some((user, password_hash)) = found else {
            verify_against_dummy(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash).await?;

        if !user.is_active {
            debug!(user_id = %user.id, "Login refused for inactive account");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.tokens.issue(user.id)?;
        Ok(Authenticated { user, access_token })
    }

    /// Resolve a bearer token to an active user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` or `AuthError::TokenInvalid` if the
    /// token fails verification or names a missing or inactive account.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.tokens.verify(token)?;
        let user_id = claims.user_id()?;

        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| AuthError::TokenInvalid("unknown user".to_string()))?;

        if !user.is_active {
            return Err(AuthError::TokenInvalid("account is inactive".to_string()));
        }

        Ok(user)
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn hash_password_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Hash a password using Argon2id, off the async executor.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|_| AuthError::PasswordHash)?
}

/// Burn the same verification time as a real login.
///
/// The dummy hash is built lazily inside the blocking task, so the first
/// unknown-email login never runs argon2 on a runtime worker.
async fn verify_against_dummy(password: &str) {
    let password = password.to_string();
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(dummy) = DUMMY_HASH.as_deref()
            && let Ok(parsed_hash) = PasswordHash::new(dummy)
        {
            let _ = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
        }
    })
    .await;
}

/// Verify a password against a PHC hash string.
async fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let password = password.to_string();
    let hash = hash.to_string();

    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash).map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    })
    .await
    .map_err(|_| AuthError::PasswordHash)?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::config::AuthConfig;
    use crate::db::MemoryStore;

    fn keys() -> TokenKeys {
        TokenKeys::new(&AuthConfig {
            jwt_secret: SecretString::from("k8Jq2vXz9LmP4rT7wB1nC6yH3sD5fG0a".to_string()),
            token_ttl: Duration::from_secs(1800),
            issuer: "food-delivery".to_string(),
        })
    }

    fn registration(email: &str, username: &str) -> Registration {
        Registration {
            email: email.to_string(),
            username: username.to_string(),
            password: "demo123".to_string(),
            full_name: Some("Demo User".to_string()),
            phone: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("demo123").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("demo123", &hash).await.is_ok());
        assert!(matches!(
            verify_password("wrong", &hash).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_then_login_and_authenticate() {
        let store = MemoryStore::new();
        let keys = keys();
        let auth = AuthService::new(&store, &keys);

        let registered = auth
            .register(registration("Demo@X.com", "demo"))
            .await
            .unwrap();
        assert_eq!(registered.user.email.as_str(), "demo@x.com");
        assert_eq!(registered.user.phone, None);

        let logged_in = auth.login("demo@x.com", "demo123").await.unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let user = auth.authenticate(&logged_in.access_token).await.unwrap();
        assert_eq!(user.id, registered.user.id);
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let store = MemoryStore::new();
        let keys = keys();
        let auth = AuthService::new(&store, &keys);

        auth.register(registration("demo@x.com", "demo"))
            .await
            .unwrap();

        let same_email = auth.register(registration("DEMO@x.com", "other")).await;
        assert!(matches!(same_email, Err(AuthError::AlreadyExists(_))));

        let same_username = auth.register(registration("other@x.com", "demo")).await;
        assert!(matches!(same_username, Err(AuthError::AlreadyExists(_))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_unknown_email_verifies_against_real_hash() {
        let store = MemoryStore::new();
        let keys = keys();
        let auth = AuthService::new(&store, &keys);

        let err = auth.login("nobody@example.com", "demo123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        // The lazily built dummy must be a parseable argon2 hash, or a miss
        // would skip the verification cost entirely
        let dummy = tokio::task::spawn_blocking(|| DUMMY_HASH.clone())
            .await
            .unwrap()
            .unwrap();
        assert!(PasswordHash::new(&dummy).is_ok());
        verify_password("timing-equaliser", &dummy).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_failures_look_alike() {
        let store = MemoryStore::new();
        let keys = keys();
        let auth = AuthService::new(&store, &keys);
        auth.register(registration("demo@x.com", "demo"))
            .await
            .unwrap();

        let wrong_password = auth.login("demo@x.com", "nope123").await.unwrap_err();
        let unknown_email = auth.login("ghost@x.com", "demo123").await.unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    }
}
