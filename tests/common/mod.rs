#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use gymgate::db::{Database, PrincipalRole};
use gymgate::jwt::{unix_timestamp, AccessClaims};
use gymgate::password::hash_password;
use gymgate::ServerConfig;

/// Signing secret shared by the test server and the token-crafting helpers.
pub const TEST_JWT_SECRET: &[u8] = b"test-jwt-secret-at-least-32-chars";

pub async fn test_db() -> Database {
    Database::open(":memory:")
        .await
        .expect("Failed to open test database")
}

pub fn test_config(db: &Database) -> ServerConfig {
    ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_JWT_SECRET.to_vec(),
        access_token_ttl_secs: gymgate::jwt::ACCESS_TOKEN_DURATION_SECS,
    }
}

/// Create an active principal with a hashed password. Returns the uuid.
pub async fn create_principal(
    db: &Database,
    email: &str,
    password: &str,
    role: PrincipalRole,
) -> String {
    let uuid = uuid::Uuid::new_v4().to_string();
    let hash = hash_password(password).expect("Failed to hash password");
    db.principals()
        .create(&uuid, email, "Test Principal", &hash, role)
        .await
        .expect("Failed to create principal");
    uuid
}

/// Craft an access token that expired in the past, signed with the test
/// secret. The server accepts the signature but rejects the expiry.
pub fn expired_access_token(principal_uuid: &str, role: PrincipalRole) -> String {
    let now = unix_timestamp().expect("System time error");
    let claims = AccessClaims {
        sub: principal_uuid.to_string(),
        role,
        iat: now - 1000,
        exp: now - 500,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("Failed to encode token")
}

/// Build a JSON POST request.
pub fn json_post(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Build a GET request with a bearer token.
pub fn authed_get(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Build a GET request without credentials.
pub fn anon_get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Collect a response body as JSON.
pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
