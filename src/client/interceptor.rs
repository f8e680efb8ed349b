//! HTTP client with transparent refresh-on-401.
//!
//! Single-flight contract: when several requests hit a 401 while a refresh
//! exchange is already running, exactly one exchange call is made. The first
//! failing request becomes the leader and performs the exchange; later
//! arrivals enqueue a continuation and suspend. On success the queue drains
//! in arrival order, each waiter resumes with the new access token and
//! replays its original request once. On failure every waiter is rejected,
//! the active audience's credentials are cleared, and the error names the
//! login route to redirect to.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::credentials::CredentialStore;

/// Timeout for any single HTTP call, including the refresh exchange.
/// A hung exchange rejects the whole queue instead of stalling it forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MEMBER_LOGIN_ROUTE: &str = "/login";
const ADMIN_LOGIN_ROUTE: &str = "/admin/login";

/// Errors surfaced by [`ApiClient`].
#[derive(Debug, Clone)]
pub enum ApiClientError {
    /// The session cannot be recovered; the caller should route the user to
    /// `login_route` and show a "session expired" indicator.
    SessionExpired { login_route: &'static str },
    /// Transport-level failure.
    Http(String),
}

impl std::fmt::Display for ApiClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiClientError::SessionExpired { login_route } => {
                write!(f, "Session expired, login required at {}", login_route)
            }
            ApiClientError::Http(msg) => write!(f, "HTTP error: {}", msg),
        }
    }
}

impl std::error::Error for ApiClientError {}

type RefreshResult = Result<String, ApiClientError>;

/// Refresh-exchange state: idle, or in flight with a FIFO queue of
/// continuations for requests that arrived during the exchange.
enum RefreshState {
    Idle,
    InFlight(Vec<oneshot::Sender<RefreshResult>>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    principal: serde_json::Value,
}

/// API client that stamps requests with the current access token and
/// recovers from authorization failures via the refresh exchange.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialStore>,
    refresh_state: Mutex<RefreshState>,
    refresh_calls: AtomicUsize,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, ApiClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiClientError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
            refresh_state: Mutex::new(RefreshState::Idle),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    /// The credential store backing this client.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Number of refresh-exchange calls performed. Tests assert the
    /// single-flight guarantee with this.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Log in as a member and persist the returned pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiClientError> {
        self.do_login("/api/auth/login", email, password, false).await
    }

    /// Log in as an admin and persist the returned pair.
    pub async fn admin_login(&self, email: &str, password: &str) -> Result<(), ApiClientError> {
        self.do_login("/api/auth/admin/login", email, password, true)
            .await
    }

    async fn do_login(
        &self,
        path: &str,
        email: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<(), ApiClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ApiClientError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiClientError::Http(format!(
                "login failed with status {}",
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiClientError::Http(e.to_string()))?;

        self.credentials.save(
            &body.access_token,
            &body.refresh_token,
            is_admin,
            Some(&body.principal.to_string()),
        );
        Ok(())
    }

    /// Log out: revoke the refresh token server-side and clear local state.
    pub async fn logout(&self) -> Result<(), ApiClientError> {
        let is_admin = self.credentials.is_admin();
        if let Some(refresh_token) = self.credentials.refresh_token() {
            let _ = self
                .http
                .post(format!("{}/api/auth/logout", self.base_url))
                .json(&serde_json::json!({ "refreshToken": refresh_token }))
                .send()
                .await;
        }
        self.credentials.clear(is_admin);
        Ok(())
    }

    /// GET with auth stamping and refresh-on-401.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ApiClientError> {
        self.execute(Method::GET, path, None).await
    }

    /// POST a JSON body with auth stamping and refresh-on-401.
    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ApiClientError> {
        self.execute(Method::POST, path, Some(body)).await
    }

    /// Send a request; on 401, refresh once and replay once.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiClientError> {
        let token = self.credentials.access_token();
        let response = self
            .send(method.clone(), path, body.clone(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(path = %path, "Got 401, attempting token refresh");
        let new_token = self.refresh_access_token().await?;

        // Replay exactly once with the new token. A second 401 means the new
        // token is also unusable; give up rather than loop.
        let response = self.send(method, path, body, Some(&new_token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let is_admin = self.credentials.is_admin();
            self.credentials.clear(is_admin);
            return Err(self.session_expired(is_admin));
        }
        Ok(response)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiClientError> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
            .send()
            .await
            .map_err(|e| ApiClientError::Http(e.to_string()))
    }

    /// Single-flight refresh: leader performs the exchange, followers wait.
    async fn refresh_access_token(&self) -> RefreshResult {
        let waiter = {
            let mut state = self
                .refresh_state
                .lock()
                .expect("refresh state lock poisoned");
            match &mut *state {
                RefreshState::InFlight(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::InFlight(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(result) => result,
                Err(_) => Err(ApiClientError::Http("refresh exchange abandoned".into())),
            };
        }

        let result = self.exchange_refresh_token().await;

        // Drain in arrival order, then go idle. Waiters enqueued after this
        // point start a new exchange.
        let waiters = {
            let mut state = self
                .refresh_state
                .lock()
                .expect("refresh state lock poisoned");
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::InFlight(queue) => queue,
                RefreshState::Idle => Vec::new(),
            }
        };
        for tx in waiters {
            let _ = tx.send(result.clone());
        }

        result
    }

    /// One refresh exchange against the audience-appropriate endpoint.
    /// Any failure is fatal: clear the audience's credentials and hand the
    /// caller the login route.
    async fn exchange_refresh_token(&self) -> RefreshResult {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);

        let is_admin = self.credentials.is_admin();
        let Some(refresh_token) = self.credentials.refresh_token() else {
            self.credentials.clear(is_admin);
            return Err(self.session_expired(is_admin));
        };

        let path = if is_admin {
            "/api/auth/admin/refresh-token"
        } else {
            "/api/auth/refresh-token"
        };

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                let body: RefreshResponse = match response.json().await {
                    Ok(body) => body,
                    Err(e) => {
                        self.credentials.clear(is_admin);
                        return Err(ApiClientError::Http(e.to_string()));
                    }
                };
                self.credentials
                    .save(&body.access_token, &body.refresh_token, is_admin, None);
                Ok(body.access_token)
            }
            Ok(response) => {
                warn!(status = %response.status(), "Refresh exchange rejected");
                self.credentials.clear(is_admin);
                Err(self.session_expired(is_admin))
            }
            Err(e) => {
                warn!(error = %e, "Refresh exchange failed");
                self.credentials.clear(is_admin);
                Err(self.session_expired(is_admin))
            }
        }
    }

    fn session_expired(&self, is_admin: bool) -> ApiClientError {
        ApiClientError::SessionExpired {
            login_route: if is_admin {
                ADMIN_LOGIN_ROUTE
            } else {
                MEMBER_LOGIN_ROUTE
            },
        }
    }
}
