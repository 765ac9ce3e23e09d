//! Order service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - HS256 signing secret (min 32 chars, high entropy)
//! - `DATABASE_URL` - `PostgreSQL` connection string (only when `STORAGE_BACKEND=postgres`)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 8001)
//! - `STORAGE_BACKEND` - `postgres` or `memory` (default: postgres)
//! - `JWT_EXPIRY_MINUTES` - Access token lifetime (default: 30)
//! - `JWT_ISSUER` - Token issuer claim (default: food-delivery)
//! - `INTERNAL_COMM_URL` - Notification service base URL (default: <http://localhost:9000>)
//! - `NOTIFY_TIMEOUT_MS` - Per-call notification timeout (default: 2000)
//! - `OUTBOX_POLL_INTERVAL_SECS` - Dispatcher poll interval (default: 5)
//! - `OUTBOX_MAX_ATTEMPTS` - Delivery attempts before an event is dead (default: 8)
//! - `OUTBOX_BACKOFF_BASE_SECS` - First retry delay (default: 2)
//! - `OUTBOX_BACKOFF_MAX_SECS` - Retry delay cap (default: 300)
//! - `INTERNAL_API_TOKEN` - Credential for internal endpoints (unset: endpoints are open)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `LOG_FORMAT` - `text` or `json` (default: text)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Order service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Where users, catalog and orders live
    pub storage: StorageConfig,
    /// Token signing configuration
    pub auth: AuthConfig,
    /// Outbound notification configuration
    pub notifier: NotifierConfig,
    /// Outbox dispatcher tuning
    pub outbox: OutboxConfig,
    /// Credential expected in `X-Internal-Token` on internal endpoints
    pub internal_api_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Log output format
    pub log_format: LogFormat,
}

/// Storage backend selection.
#[derive(Clone)]
pub enum StorageConfig {
    /// `PostgreSQL` via sqlx.
    Postgres {
        /// Connection URL (contains password)
        database_url: SecretString,
    },
    /// Process-local collections, seeded from the embedded catalog.
    Memory,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Access token configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: SecretString,
    /// Token lifetime
    pub token_ttl: Duration,
    /// `iss` claim written and required on every token
    pub issuer: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Internal communication service configuration.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Base URL of the internal communication service
    pub base_url: Url,
    /// Timeout applied to each notification call
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:9000").expect("default notifier URL is valid"),
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Outbox dispatcher configuration.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// How often the dispatcher scans for due events when not woken
    pub poll_interval: Duration,
    /// Failed attempts after which an event is marked dead
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt
    pub backoff_base: Duration,
    /// Upper bound on the retry delay
    pub backoff_max: Duration,
    /// Events claimed per scan
    pub batch_size: u32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 8,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(300),
            batch_size: 32,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (length, placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("HOST", "127.0.0.1")?;
        let port = parse_env("PORT", "8001")?;

        let storage = match get_env_or_default("STORAGE_BACKEND", "postgres")
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => StorageConfig::Postgres {
                database_url: get_required_secret("DATABASE_URL")?,
            },
            "memory" => StorageConfig::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "STORAGE_BACKEND".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };

        let auth = AuthConfig::from_env()?;
        let notifier = NotifierConfig::from_env()?;
        let outbox = OutboxConfig::from_env()?;

        let internal_api_token = get_optional_env("INTERNAL_API_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);

        let log_format = get_env_or_default("LOG_FORMAT", "text")
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("LOG_FORMAT".to_string(), e))?;

        Ok(Self {
            host,
            port,
            storage,
            auth,
            notifier,
            outbox,
            internal_api_token,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_format,
        })
    }

    /// Configuration for an in-memory instance with default tuning.
    ///
    /// The secret is used as-is; strength checks only apply to
    /// [`ServerConfig::from_env`].
    #[must_use]
    pub fn in_memory(jwt_secret: SecretString) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8001,
            storage: StorageConfig::Memory,
            auth: AuthConfig {
                jwt_secret,
                token_ttl: Duration::from_secs(30 * 60),
                issuer: "food-delivery".to_string(),
            },
            notifier: NotifierConfig::default(),
            outbox: OutboxConfig::default(),
            internal_api_token: None,
            sentry_dsn: None,
            sentry_environment: None,
            log_format: LogFormat::Text,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        let minutes: u64 = parse_env("JWT_EXPIRY_MINUTES", "30")?;
        if minutes == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "JWT_EXPIRY_MINUTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            jwt_secret,
            token_ttl: Duration::from_secs(minutes * 60),
            issuer: get_env_or_default("JWT_ISSUER", "food-delivery"),
        })
    }
}

impl NotifierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = Url::parse(&get_env_or_default("INTERNAL_COMM_URL", "http://localhost:9000"))
            .map_err(|e| ConfigError::InvalidEnvVar("INTERNAL_COMM_URL".to_string(), e.to_string()))?;
        let timeout_ms: u64 = parse_env("NOTIFY_TIMEOUT_MS", "2000")?;

        Ok(Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

impl OutboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_attempts: u32 = parse_env("OUTBOX_MAX_ATTEMPTS", "8")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "OUTBOX_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            poll_interval: Duration::from_secs(parse_env("OUTBOX_POLL_INTERVAL_SECS", "5")?),
            max_attempts,
            backoff_base: Duration::from_secs(parse_env("OUTBOX_BACKOFF_BASE_SECS", "2")?),
            backoff_max: Duration::from_secs(parse_env("OUTBOX_BACKOFF_MAX_SECS", "300")?),
            ..Self::default()
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
