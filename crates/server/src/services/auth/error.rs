//! Authentication error types.

use thiserror::Error;

use food_delivery_core::{EmailError, UsernameError};

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Invalid credentials (wrong password, unknown email or inactive account).
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Email or username already registered; names the field.
    #[error("{0}")]
    AlreadyExists(String),

    /// Token is malformed, badly signed or names no usable account.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// Token has expired.
    #[error("token expired")]
    TokenExpired,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
