//! Authentication route handlers.
//!
//! Registration and login return a bearer token together with the user, in
//! the `{access_token, token_type, user}` shape the web client expects.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{ApiJson, Result};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{AuthService, Authenticated, Registration};
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token response for register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

impl From<Authenticated> for AuthResponse {
    fn from(auth: Authenticated) -> Self {
        Self {
            access_token: auth.access_token,
            token_type: "bearer",
            user: auth.user,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let auth = AuthService::new(state.store(), state.tokens())
        .register(Registration {
            email: body.email,
            username: body.username,
            password: body.password,
            full_name: body.full_name,
            phone: body.phone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(auth.into())))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let auth = AuthService::new(state.store(), state.tokens())
        .login(&body.email, &body.password)
        .await?;

    tracing::info!(user_id = %auth.user.id, "User logged in");
    Ok(Json(auth.into()))
}

/// `GET /auth/me`
pub async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}
