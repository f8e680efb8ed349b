//! Authentication failure taxonomy.
//!
//! Each variant maps to a stable status/message pair. The client interceptor
//! keys its recovery decision on these: only "Token expired" is recoverable
//! via the refresh exchange, everything else forces a fresh login or is a
//! plain authorization denial.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No Authorization header / no bearer token
    NoToken,
    /// Not a JWT, bad signature, or the subject no longer exists
    MalformedToken,
    /// Signature valid, expiry passed
    ExpiredToken,
    /// Valid principal but not the required role
    InsufficientRole,
    /// Valid token but the account has been deactivated
    PrincipalInactive,
    /// Storage failure during verification
    DatabaseError,
}

/// Authentication rejection returned by the extractors.
#[derive(Debug)]
pub struct AuthError {
    kind: AuthErrorKind,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NoToken
            | AuthErrorKind::MalformedToken
            | AuthErrorKind::ExpiredToken => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole | AuthErrorKind::PrincipalInactive => {
                StatusCode::FORBIDDEN
            }
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NoToken => "No token provided",
            AuthErrorKind::MalformedToken => "Malformed token",
            AuthErrorKind::ExpiredToken => "Token expired",
            AuthErrorKind::InsufficientRole => "Insufficient role",
            AuthErrorKind::PrincipalInactive => "Account inactive",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }
}

impl From<AuthErrorKind> for AuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
