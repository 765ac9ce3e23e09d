//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use food_delivery_core::{Email, UserId, UserRole, Username};

/// A registered account.
///
/// The password hash is not part of this type; storage returns it
/// separately, to the login path only.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Lowercased, unique email address.
    pub email: Email,
    /// Unique public handle.
    pub username: Username,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    /// Inactive accounts cannot log in or use existing tokens.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub username: Username,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}
