//! Authentication module for StoreChat

pub mod jwt;

pub use jwt::{AuthError, Claims, Identity, TokenVerifier};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, state::AppState};

/// Authenticated caller on the read-model HTTP surface.
///
/// Extracts and verifies a `Bearer` token from the `Authorization`
/// header. The live WebSocket protocol authenticates separately via the
/// `token` query parameter at upgrade time.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let identity = state.verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            ApiError::InvalidToken
        })?;

        Ok(AuthUser(identity))
    }
}

/// Guard for staff/admin-only endpoints.
pub fn require_staff(identity: &Identity) -> Result<(), ApiError> {
    if identity.role.is_staff() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
