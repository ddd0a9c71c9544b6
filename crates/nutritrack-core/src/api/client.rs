//! API client for communicating with the nutritrack REST API.
//!
//! This module provides the `AuthClient` struct for logging in, making
//! authenticated requests with transparent token refresh, and logging out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{MemoryTokenStore, TokenKey, TokenStore};
use crate::models::{LoginOutcome, TokenPair, User};

use super::AuthError;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint path on the API server
const LOGIN_PATH: &str = "/login";

/// Token refresh endpoint path
const REFRESH_PATH: &str = "/auth/refresh";

/// Authenticated profile endpoint path
const PROFILE_PATH: &str = "/api/auth/profile";

/// User agent sent with every request
const USER_AGENT: &str = concat!("nutritrack-client/", env!("CARGO_PKG_VERSION"));

/// Refresh coordination state shared across clones of one client.
///
/// `epoch` counts completed refresh attempts; a caller that observed an
/// older epoch while waiting for the gate knows a concurrent refresh
/// finished and adopts its outcome instead of issuing another request.
/// The boolean behind the gate is that last outcome.
struct RefreshSync {
    epoch: AtomicU64,
    gate: Mutex<bool>,
}

/// API client for the nutritrack server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the token store and refresh coordination.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    refresh_sync: Arc<RefreshSync>,
}

impl AuthClient {
    /// Create a client with the default in-memory token store
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> AuthClientBuilder {
        AuthClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticate with email and password.
    ///
    /// On success the issued token pair overwrites whatever the store held
    /// before. Credentials are used for this one request and dropped.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let request = LoginRequest { email, password };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message =
                server_message(&body).unwrap_or_else(|| "Login failed".to_string());
            warn!(status = %status, "Login rejected");
            return Err(AuthError::LoginFailed(AuthError::truncate_message(&message)));
        }

        let body = response.text().await?;
        let envelope: LoginEnvelope = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidResponse(format!("login response: {}", e)))?;

        let LoginData { user, tokens } = envelope.data;
        self.store_pair(&tokens)?;
        info!(user = %user.display_name(), "Login successful");

        Ok(LoginOutcome { user, tokens })
    }

    /// Issue an authenticated GET request and return the parsed JSON body.
    ///
    /// `url` may be absolute or relative to the client's base URL. A 401
    /// triggers one token refresh followed by one retry of the original
    /// request; a second 401 means the session is gone.
    pub async fn authenticated_request(&self, url: &str) -> Result<Value, AuthError> {
        let url = self.resolve_url(url);
        let mut refreshed = false;

        loop {
            let token = self
                .read_token(TokenKey::Access)?
                .ok_or(AuthError::NotAuthenticated)?;

            let response = self.client.get(&url).bearer_auth(&token).send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::UNAUTHORIZED {
                // Retry is bounded to one refresh per call; a server that
                // keeps returning 401 after a successful refresh ends the
                // session rather than looping.
                if refreshed || !self.refresh().await? {
                    self.clear_tokens()?;
                    return Err(AuthError::SessionExpired);
                }
                refreshed = true;
                debug!(url = %url, "Access token refreshed, retrying request");
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message =
                    server_message(&body).unwrap_or_else(|| "Request failed".to_string());
                return Err(AuthError::RequestFailed {
                    status: status.as_u16(),
                    message: AuthError::truncate_message(&message),
                });
            }

            let body = response.text().await?;
            return serde_json::from_str(&body)
                .map_err(|e| AuthError::InvalidResponse(format!("response from {}: {}", url, e)));
        }
    }

    /// Fetch the authenticated user's profile
    pub async fn fetch_profile(&self) -> Result<User, AuthError> {
        let value = self.authenticated_request(PROFILE_PATH).await?;

        // The profile endpoint wraps the user in a data envelope; fall back
        // to treating the whole body as the user object if it doesn't.
        let user_value = value.pointer("/data/user").cloned().unwrap_or(value);
        serde_json::from_value(user_value)
            .map_err(|e| AuthError::InvalidResponse(format!("profile response: {}", e)))
    }

    /// Renew the token pair using the stored refresh token.
    ///
    /// Returns whether the store now holds a fresh pair. A `false` return is
    /// a normal "cannot refresh" outcome, not a fault: missing refresh
    /// token, a server rejection (which also clears the stored pair), or a
    /// transport failure all report `false`. Only token store I/O errors
    /// propagate as errors.
    ///
    /// At most one refresh request is in flight per client instance;
    /// concurrent callers wait and share the in-flight result.
    pub async fn refresh(&self) -> Result<bool, AuthError> {
        let observed = self.refresh_sync.epoch.load(Ordering::Acquire);
        let mut last_outcome = self.refresh_sync.gate.lock().await;

        if self.refresh_sync.epoch.load(Ordering::Acquire) != observed {
            debug!("Adopting result of concurrent token refresh");
            return Ok(*last_outcome);
        }

        match self.refresh_flight().await? {
            Some(outcome) => {
                *last_outcome = outcome;
                self.refresh_sync.epoch.fetch_add(1, Ordering::Release);
                Ok(outcome)
            }
            // No refresh token stored - nothing was attempted, nothing to share
            None => Ok(false),
        }
    }

    /// One actual refresh attempt against the server.
    /// Returns None when no refresh token is stored (no request made).
    async fn refresh_flight(&self) -> Result<Option<bool>, AuthError> {
        let Some(refresh_token) = self.read_token(TokenKey::Refresh)? else {
            debug!("No refresh token stored, cannot refresh");
            return Ok(None);
        };

        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let request = RefreshRequest {
            refresh_token: &refresh_token,
        };

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                // Transport failures don't invalidate the stored pair; the
                // caller just learns the refresh didn't happen.
                warn!(error = %e, "Token refresh request failed");
                return Ok(Some(false));
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Refresh token rejected, clearing session");
            self.clear_tokens()?;
            return Ok(Some(false));
        }

        let body = response.text().await.unwrap_or_default();
        // Unlike login, the refresh endpoint returns the pair at the top
        // level of the body. The two shapes are separate server contracts.
        let tokens: TokenPair = match serde_json::from_str(&body) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to parse refresh response");
                return Ok(Some(false));
            }
        };

        self.store_pair(&tokens)?;
        debug!("Token pair refreshed");
        Ok(Some(true))
    }

    /// Drop the stored token pair. Local only - the server is not contacted,
    /// and calling this without a session is a no-op.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.clear_tokens()?;
        info!("Logged out");
        Ok(())
    }

    /// Whether the store currently holds an access token
    pub fn is_authenticated(&self) -> bool {
        matches!(self.store.get(TokenKey::Access), Ok(Some(_)))
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    fn read_token(&self, key: TokenKey) -> Result<Option<String>, AuthError> {
        Ok(self.store.get(key)?)
    }

    /// Write both tokens. Access first, so a crash between writes leaves a
    /// state that reads as "not authenticated" rather than one with a live
    /// access token and no way to renew it.
    fn store_pair(&self, tokens: &TokenPair) -> Result<(), AuthError> {
        self.store.set(TokenKey::Access, &tokens.access_token)?;
        self.store.set(TokenKey::Refresh, &tokens.refresh_token)?;
        Ok(())
    }

    fn clear_tokens(&self) -> Result<(), AuthError> {
        self.store.remove(TokenKey::Access)?;
        self.store.remove(TokenKey::Refresh)?;
        Ok(())
    }
}

/// Builder for AuthClient
#[derive(Default)]
pub struct AuthClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl AuthClientBuilder {
    /// Set the base URL of the API server
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the token store backend. Defaults to in-memory storage.
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a request timeout. Without one, requests wait indefinitely
    /// for the server.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AuthClient, AuthError> {
        let base_url = self
            .base_url
            .ok_or_else(|| AuthError::Configuration("base_url is required".into()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = Client::builder()
            .user_agent(self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()));

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(AuthClient {
            client,
            base_url,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
            refresh_sync: Arc::new(RefreshSync {
                epoch: AtomicU64::new(0),
                gate: Mutex::new(false),
            }),
        })
    }
}

// Internal wire types for requests and response parsing

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    data: LoginData,
}

#[derive(Deserialize)]
struct LoginData {
    user: User,
    tokens: TokenPair,
}

/// Error bodies carry the explanation under either `message` or `error`
/// depending on the endpoint
#[derive(Deserialize, Default)]
struct ServerMessage {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn server_message(body: &str) -> Option<String> {
    let parsed: ServerMessage = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .filter(|message| !message.is_empty())
}
