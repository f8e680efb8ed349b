//! Axum extractors for authenticated routes.
//!
//! Per-request state machine: no token rejects immediately; a present token
//! is verified (signature + expiry) and on success the resolved principal is
//! attached to the request. Admin routes additionally require the admin role
//! and an active principal record. The verifier never retries and never
//! mutates storage; all recovery happens client-side.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use super::bearer::bearer_token;
use super::errors::{AuthError, AuthErrorKind};
use super::state::HasAuthState;
use crate::db::{PrincipalRole, PrincipalStatus};
use crate::jwt::JwtError;

/// Principal identity resolved from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub uuid: String,
    pub role: PrincipalRole,
}

/// Verify the bearer access token on the request. Stateless: no DB access.
fn verify_token<S>(parts: &Parts, state: &S) -> Result<AuthPrincipal, AuthError>
where
    S: HasAuthState,
{
    let token = bearer_token(&parts.headers).ok_or(AuthErrorKind::NoToken)?;

    let claims = state
        .jwt()
        .validate_access_token(token)
        .map_err(|e| match e {
            JwtError::Expired => AuthErrorKind::ExpiredToken,
            _ => AuthErrorKind::MalformedToken,
        })?;

    Ok(AuthPrincipal {
        uuid: claims.sub,
        role: claims.role,
    })
}

/// Extractor for routes any authenticated principal may call.
/// Checks signature and expiry only.
pub struct Auth(pub AuthPrincipal);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        verify_token(parts, state).map(Auth)
    }
}

/// Extractor for admin-only routes.
///
/// Requires the admin role in the claims and an active principal record.
/// The status check hits the database so that deactivating an admin takes
/// effect immediately, not only after their access token expires.
pub struct AdminAuth(pub AuthPrincipal);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = verify_token(parts, state)?;

        if !principal.role.is_admin() {
            return Err(AuthErrorKind::InsufficientRole.into());
        }

        let record = state
            .db()
            .principals()
            .get_by_uuid(&principal.uuid)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up principal");
                AuthErrorKind::DatabaseError
            })?
            .ok_or(AuthErrorKind::MalformedToken)?;

        if record.status != PrincipalStatus::Active {
            return Err(AuthErrorKind::PrincipalInactive.into());
        }

        Ok(AdminAuth(principal))
    }
}
