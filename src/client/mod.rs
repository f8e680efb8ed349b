//! Client-side session handling: credential storage and an HTTP wrapper
//! with transparent refresh-on-401.

mod credentials;
mod interceptor;

pub use credentials::{
    is_expired, is_expired_at, CredentialStore, ADMIN_AUTH_KEY, ADMIN_INFO_KEY, ADMIN_TOKEN_KEY,
    AUTH_TOKEN_KEY, EXPIRY_BUFFER_SECS, REFRESH_TOKEN_KEY, USER_INFO_KEY,
};
pub use interceptor::{ApiClient, ApiClientError};
