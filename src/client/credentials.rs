//! Client credential store: an in-memory analog of browser local storage.
//!
//! Key layout mirrors what the web frontend persists: the access token under
//! a role-scoped key, the refresh token under one shared key, and an
//! `adminAuth` marker plus a principal snapshot per audience. Because member
//! and admin tokens live under different keys, both sessions can coexist;
//! getters prefer the admin-scoped token when present.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const ADMIN_TOKEN_KEY: &str = "adminToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const ADMIN_AUTH_KEY: &str = "adminAuth";
pub const USER_INFO_KEY: &str = "userInfo";
pub const ADMIN_INFO_KEY: &str = "adminInfo";

/// Safety buffer: a token is treated as expired five minutes before its real
/// expiry so requests already in flight do not race the server-side check.
pub const EXPIRY_BUFFER_SECS: u64 = 5 * 60;

#[derive(Default)]
pub struct CredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, key: &str, value: String) {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .remove(key);
    }

    /// Read a raw entry (tests and the info getters use this).
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Persist a token pair for one audience. The refresh token always lands
    /// under the shared key; the access token under the audience's own key.
    pub fn save(
        &self,
        access_token: &str,
        refresh_token: &str,
        is_admin: bool,
        principal_json: Option<&str>,
    ) {
        if is_admin {
            self.set(ADMIN_TOKEN_KEY, access_token.to_string());
            self.set(ADMIN_AUTH_KEY, "true".to_string());
            if let Some(info) = principal_json {
                self.set(ADMIN_INFO_KEY, info.to_string());
            }
        } else {
            self.set(AUTH_TOKEN_KEY, access_token.to_string());
            if let Some(info) = principal_json {
                self.set(USER_INFO_KEY, info.to_string());
            }
        }
        self.set(REFRESH_TOKEN_KEY, refresh_token.to_string());
    }

    /// Current access token, preferring the admin-scoped one.
    pub fn access_token(&self) -> Option<String> {
        self.get(ADMIN_TOKEN_KEY).or_else(|| self.get(AUTH_TOKEN_KEY))
    }

    /// Current refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    /// Whether the admin session is the active audience.
    pub fn is_admin(&self) -> bool {
        self.get(ADMIN_AUTH_KEY).as_deref() == Some("true")
    }

    /// Remove the named audience's keys plus the shared refresh token.
    /// The other audience's keys are untouched.
    pub fn clear(&self, is_admin: bool) {
        if is_admin {
            self.remove(ADMIN_TOKEN_KEY);
            self.remove(ADMIN_AUTH_KEY);
            self.remove(ADMIN_INFO_KEY);
        } else {
            self.remove(AUTH_TOKEN_KEY);
            self.remove(USER_INFO_KEY);
        }
        self.remove(REFRESH_TOKEN_KEY);
    }
}

/// Whether a token should be treated as expired at `now` (Unix seconds).
///
/// The claims segment is decoded without signature verification; the client
/// holds no key material. Anything undecodable is treated as expired, which
/// routes it into the refresh/re-login path.
pub fn is_expired_at(token: &str, now: u64) -> bool {
    let Some(exp) = decode_exp(token) else {
        return true;
    };
    now >= exp.saturating_sub(EXPIRY_BUFFER_SECS)
}

/// `is_expired_at` against the current clock.
pub fn is_expired(token: &str) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(u64::MAX);
    is_expired_at(token, now)
}

fn decode_exp(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_u64()
}
