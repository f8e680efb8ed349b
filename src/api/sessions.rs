//! Session API endpoints.
//!
//! - POST `/login` and `/admin/login` - password login, returns a token pair
//! - POST `/refresh-token` and `/admin/refresh-token` - rotate a refresh token
//! - POST `/logout` - revoke a refresh token
//! - GET `/verify` - check the current access token

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, HasAuthState};
use crate::db::{Database, Principal, PrincipalRole, PrincipalStatus};
use crate::impl_has_auth_state;
use crate::jwt::{
    generate_refresh_token, unix_timestamp, JwtConfig, REFRESH_TOKEN_DURATION_SECS,
};
use crate::password::verify_password;

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_state!(SessionsState);

pub fn router(state: SessionsState) -> Router {
    Router::new()
        .route("/login", post(member_login))
        .route("/admin/login", post(admin_login))
        .route("/refresh-token", post(member_refresh))
        .route("/admin/refresh-token", post(admin_refresh))
        .route("/logout", post(logout))
        .route("/verify", get(verify))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Principal snapshot returned to the client at login.
#[derive(Serialize)]
struct PrincipalInfo {
    uuid: String,
    email: String,
    name: String,
    role: PrincipalRole,
}

impl From<Principal> for PrincipalInfo {
    fn from(p: Principal) -> Self {
        Self {
            uuid: p.uuid,
            email: p.email,
            name: p.name,
            role: p.role,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    principal: PrincipalInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

async fn member_login(
    State(state): State<SessionsState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    login(state, PrincipalRole::Member, req).await
}

async fn admin_login(
    State(state): State<SessionsState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    login(state, PrincipalRole::Admin, req).await
}

/// One login flow for both audiences; the audience only selects which role
/// the email must resolve to. Unknown email and wrong password produce the
/// same response so the endpoint does not disclose which part failed.
async fn login(
    state: SessionsState,
    role: PrincipalRole,
    req: LoginRequest,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let principal = state
        .db
        .principals()
        .get_by_email(&req.email, role)
        .await
        .db_err("Failed to look up principal")?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(&req.password, &principal.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if principal.status != PrincipalStatus::Active {
        return Err(ApiError::forbidden("Account inactive"));
    }

    let (access_token, refresh_token) = issue_pair(&state, &principal.uuid, role).await?;

    info!(principal = %principal.uuid, role = role.as_str(), "Login");

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            access_token,
            refresh_token,
            principal: PrincipalInfo::from(principal),
        }),
    ))
}

/// Mint an access/refresh pair and register the refresh token in the store.
async fn issue_pair(
    state: &SessionsState,
    principal_uuid: &str,
    role: PrincipalRole,
) -> Result<(String, String), ApiError> {
    let access_token = state
        .jwt
        .generate_access_token(principal_uuid, role)
        .map_err(|e| {
            error!(error = %e, "Failed to generate access token");
            ApiError::internal("Failed to generate token")
        })?;

    let now = unix_timestamp().map_err(|_| ApiError::internal("Failed to generate token"))? as i64;
    let refresh_token = generate_refresh_token();
    state
        .db
        .refresh_tokens()
        .insert(
            &refresh_token,
            principal_uuid,
            role,
            now,
            now + REFRESH_TOKEN_DURATION_SECS as i64,
        )
        .await
        .db_err("Failed to register refresh token")?;

    Ok((access_token, refresh_token))
}

async fn member_refresh(
    State(state): State<SessionsState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    refresh(state, PrincipalRole::Member, req).await
}

async fn admin_refresh(
    State(state): State<SessionsState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    refresh(state, PrincipalRole::Admin, req).await
}

/// Exchange a refresh token for a new pair (single-use rotation).
///
/// A token that is unknown, expired, or bound to the other audience fails
/// with 403; the client must treat that as fatal and re-login. The inactive
/// check runs before rotation so a deactivated principal cannot consume its
/// old token into a fresh one.
async fn refresh(
    state: SessionsState,
    role: PrincipalRole,
    req: RefreshRequest,
) -> Result<(StatusCode, Json<RefreshResponse>), ApiError> {
    let now = unix_timestamp().map_err(|_| ApiError::internal("Failed to generate token"))? as i64;

    let entry = state
        .db
        .refresh_tokens()
        .get(&req.refresh_token, now)
        .await
        .db_err("Failed to look up refresh token")?
        .filter(|entry| entry.role == role)
        .ok_or_else(|| ApiError::forbidden("Invalid refresh token"))?;

    let principal = state
        .db
        .principals()
        .get_by_uuid(&entry.principal_uuid)
        .await
        .db_err("Failed to look up principal")?
        .ok_or_else(|| ApiError::forbidden("Invalid refresh token"))?;

    if principal.status != PrincipalStatus::Active {
        return Err(ApiError::forbidden("Account inactive"));
    }

    let new_refresh_token = generate_refresh_token();
    let rotated = state
        .db
        .refresh_tokens()
        .rotate(
            &req.refresh_token,
            &new_refresh_token,
            role,
            now,
            now + REFRESH_TOKEN_DURATION_SECS as i64,
        )
        .await
        .db_err("Failed to rotate refresh token")?;

    // A concurrent rotation may have consumed the token between the lookup
    // and the transaction; that request won, this one is invalid.
    if rotated.is_none() {
        return Err(ApiError::forbidden("Invalid refresh token"));
    }

    let access_token = state
        .jwt
        .generate_access_token(&entry.principal_uuid, role)
        .map_err(|e| {
            error!(error = %e, "Failed to generate access token");
            ApiError::internal("Failed to generate token")
        })?;

    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            access_token,
            refresh_token: new_refresh_token,
        }),
    ))
}

/// Logout: revoke the refresh token. Always succeeds; revoking a token that
/// is already gone is not an error.
async fn logout(
    State(state): State<SessionsState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .refresh_tokens()
        .delete(&req.refresh_token)
        .await
        .db_err("Failed to revoke refresh token")?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))))
}

/// Verify that the current access token is still valid.
/// Returns 200 if valid, 401 if not. Lightweight auth-status probe.
async fn verify(Auth(_principal): Auth) -> impl IntoResponse {
    StatusCode::OK
}
