//! Minimal protected surface: a principal's own snapshot and an admin-only
//! overview. These exist to be gated, not to be a resource API.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminAuth, Auth};
use crate::db::{Database, PrincipalRole, PrincipalStatus};
use crate::impl_has_auth_state;
use crate::jwt::{unix_timestamp, JwtConfig};

#[derive(Clone)]
pub struct AccountState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_state!(AccountState);

pub fn router(state: AccountState) -> Router {
    Router::new().route("/me", get(me)).with_state(state)
}

pub fn admin_router(state: AccountState) -> Router {
    Router::new()
        .route("/overview", get(overview))
        .with_state(state)
}

#[derive(Serialize)]
struct MeResponse {
    uuid: String,
    email: String,
    name: String,
    role: PrincipalRole,
    status: PrincipalStatus,
}

/// Current principal's account snapshot.
async fn me(
    State(state): State<AccountState>,
    Auth(principal): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .db
        .principals()
        .get_by_uuid(&principal.uuid)
        .await
        .db_err("Failed to look up principal")?
        .ok_or_else(|| ApiError::unauthorized("Malformed token"))?;

    Ok((
        StatusCode::OK,
        Json(MeResponse {
            uuid: record.uuid,
            email: record.email,
            name: record.name,
            role: record.role,
            status: record.status,
        }),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverviewResponse {
    members: i64,
    admins: i64,
    active_sessions: i64,
}

/// Admin-only counts over the two audiences and the session store.
async fn overview(
    State(state): State<AccountState>,
    AdminAuth(_admin): AdminAuth,
) -> Result<impl IntoResponse, ApiError> {
    let now = unix_timestamp().map_err(|_| ApiError::internal("System time error"))? as i64;

    let members = state
        .db
        .principals()
        .count_by_role(PrincipalRole::Member)
        .await
        .db_err("Failed to count members")?;
    let admins = state
        .db
        .principals()
        .count_by_role(PrincipalRole::Admin)
        .await
        .db_err("Failed to count admins")?;
    let active_sessions = state
        .db
        .refresh_tokens()
        .count_active(now)
        .await
        .db_err("Failed to count sessions")?;

    Ok((
        StatusCode::OK,
        Json(OverviewResponse {
            members,
            admins,
            active_sessions,
        }),
    ))
}
