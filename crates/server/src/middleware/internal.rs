//! Service-to-service credential for internal endpoints.

use axum::{extract::FromRequestParts, http::request::Parts};
use secrecy::ExposeSecret;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the internal API token.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Extractor guarding endpoints meant for other services.
///
/// Requires `X-Internal-Token` to match `INTERNAL_API_TOKEN`. When no token
/// is configured the endpoints are open; startup logs a warning for that.
pub struct RequireInternal;

impl FromRequestParts<AppState> for RequireInternal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.config().internal_api_token else {
            return Ok(Self);
        };

        let provided = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if constant_time_eq(provided.as_bytes(), expected.expose_secret().as_bytes()) {
            Ok(Self)
        } else {
            tracing::warn!(path = %parts.uri.path(), "Rejected internal request with bad token");
            Err(AppError::Unauthorized("Invalid internal token".to_string()))
        }
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
