mod account;
mod error;
mod sessions;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;

/// Create the API router.
pub fn create_api_router(db: Database, jwt: Arc<JwtConfig>) -> Router {
    let sessions_state = sessions::SessionsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let account_state = account::AccountState { db, jwt };

    Router::new()
        .nest("/auth", sessions::router(sessions_state))
        .nest("/account", account::router(account_state.clone()))
        .nest("/admin", account::admin_router(account_state))
}
