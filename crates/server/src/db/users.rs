//! User repository for `PostgreSQL`.

use async_trait::async_trait;

use food_delivery_core::{Email, UserId, Username};

use super::{PgStore, RepositoryError, UserStore, map_unique_violation};
use crate::models::{NewUser, User};

const USER_COLUMNS: &str =
    "id, email, username, full_name, phone, role, is_active, created_at";

/// A user row joined with its password hash.
#[derive(sqlx::FromRow)]
struct UserWithHash {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (email, username, password_hash, full_name, phone) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(&user.phone)
            .fetch_one(self.pool())
            .await
            .map_err(map_unique_violation)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");

        let row = sqlx::query_as::<_, UserWithHash>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    async fn email_taken(&self, email: &Email) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(self.pool())
            .await?;

        Ok(taken)
    }

    async fn username_taken(&self, username: &Username) -> Result<bool, RepositoryError> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))")
                .bind(username)
                .fetch_one(self.pool())
                .await?;

        Ok(taken)
    }
}
