//! Tests for the refresh-exchange endpoints.
//!
//! Covers:
//! - Rotation: new pair returned, old token consumed, single-use
//! - Unknown/fabricated tokens and audience mismatches
//! - Inactive principals cannot refresh
//! - Logout revocation

mod common;

use axum::http::StatusCode;
use common::*;
use gymgate::create_app;
use gymgate::db::{PrincipalRole, PrincipalStatus};
use tower::ServiceExt;

async fn login_tokens(
    app: &axum::Router,
    path: &str,
    email: &str,
    password: &str,
) -> (String, String) {
    let response = app
        .clone()
        .oneshot(json_post(
            path,
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_refresh_returns_new_pair() {
    let db = test_db().await;
    create_principal(&db, "alice@gym.test", "pw", PrincipalRole::Member).await;
    let app = create_app(&test_config(&db));

    let (access, refresh) = login_tokens(&app, "/api/auth/login", "alice@gym.test", "pw").await;

    let response = app
        .clone()
        .oneshot(json_post(
            "/api/auth/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let new_access = body["accessToken"].as_str().unwrap();
    let new_refresh = body["refreshToken"].as_str().unwrap();
    assert_ne!(new_refresh, refresh);
    assert!(!new_access.is_empty());
    assert_ne!(new_access, access);

    // The fresh access token works on a protected route.
    let me = app
        .oneshot(authed_get("/api/account/me", new_access))
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rotation_is_single_use() {
    let db = test_db().await;
    create_principal(&db, "alice@gym.test", "pw", PrincipalRole::Member).await;
    let app = create_app(&test_config(&db));

    let (_, refresh) = login_tokens(&app, "/api/auth/login", "alice@gym.test", "pw").await;

    let first = app
        .clone()
        .oneshot(json_post(
            "/api/auth/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Replaying the consumed token is fatal.
    let second = app
        .oneshot(json_post(
            "/api/auth/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::FORBIDDEN);
    let body = body_json(second).await;
    assert_eq!(body["error"], "Invalid refresh token");
}

#[tokio::test]
async fn test_unknown_refresh_token_rejected_without_mutation() {
    let db = test_db().await;
    let app = create_app(&test_config(&db));

    let response = app
        .oneshot(json_post(
            "/api/auth/refresh-token",
            serde_json::json!({ "refreshToken": "fabricated-token-value" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid refresh token");
    assert_eq!(db.refresh_tokens().count_active(0).await.unwrap(), 0);
}

#[tokio::test]
async fn test_member_refresh_token_rejected_on_admin_endpoint() {
    let db = test_db().await;
    create_principal(&db, "alice@gym.test", "pw", PrincipalRole::Member).await;
    let app = create_app(&test_config(&db));

    let (_, refresh) = login_tokens(&app, "/api/auth/login", "alice@gym.test", "pw").await;

    let response = app
        .clone()
        .oneshot(json_post(
            "/api/auth/admin/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid refresh token");

    // The audience mismatch did not consume the member token.
    let retry = app
        .oneshot(json_post(
            "/api/auth/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(retry.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_inactive_principal_cannot_refresh() {
    let db = test_db().await;
    let uuid = create_principal(&db, "alice@gym.test", "pw", PrincipalRole::Member).await;
    let app = create_app(&test_config(&db));

    let (_, refresh) = login_tokens(&app, "/api/auth/login", "alice@gym.test", "pw").await;

    db.principals()
        .set_status(&uuid, PrincipalStatus::Inactive)
        .await
        .unwrap();

    let response = app
        .oneshot(json_post(
            "/api/auth/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Account inactive");
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let db = test_db().await;
    create_principal(&db, "alice@gym.test", "pw", PrincipalRole::Member).await;
    let app = create_app(&test_config(&db));

    let (_, refresh) = login_tokens(&app, "/api/auth/login", "alice@gym.test", "pw").await;

    let logout = app
        .clone()
        .oneshot(json_post(
            "/api/auth/logout",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);

    let response = app
        .oneshot(json_post(
            "/api/auth/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_of_unknown_token_is_ok() {
    let db = test_db().await;
    let app = create_app(&test_config(&db));

    let response = app
        .oneshot(json_post(
            "/api/auth/logout",
            serde_json::json!({ "refreshToken": "never-issued" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_refresh_round_trip() {
    let db = test_db().await;
    create_principal(&db, "boss@gym.test", "pw-boss", PrincipalRole::Admin).await;
    let app = create_app(&test_config(&db));

    let (_, refresh) =
        login_tokens(&app, "/api/auth/admin/login", "boss@gym.test", "pw-boss").await;

    let response = app
        .clone()
        .oneshot(json_post(
            "/api/auth/admin/refresh-token",
            serde_json::json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let new_access = body["accessToken"].as_str().unwrap();

    // The refreshed admin token still clears the admin gate.
    let overview = app
        .oneshot(authed_get("/api/admin/overview", new_access))
        .await
        .unwrap();
    assert_eq!(overview.status(), StatusCode::OK);
}
