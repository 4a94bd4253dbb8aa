//! Credential supplier
//!
//! Confidential-client grants against the Spotify accounts token endpoint
//! (authorization-code and refresh-token), plus `TokenManager`, which keeps
//! the current access token fresh behind the [`TokenProvider`] seam so
//! nothing downstream ever looks credentials up ambiently.

use crate::error::{Result, SpotifyError};
use crate::types::TokenGrant;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default token endpoint of the Spotify accounts service.
pub const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Refresh this long before the stored expiry to absorb clock skew and
/// request latency.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Something that can hand out a currently-valid bearer token.
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Return a token expected to be valid right now, refreshing if needed.
    async fn get_valid_token(&self) -> Result<String>;

    /// Force a refresh (after an upstream 401) and return the new token.
    async fn refresh_now(&self) -> Result<String>;
}

/// Client for the accounts token endpoint.
///
/// The client secret stays server-side; browsers only ever see the tokens
/// this hands back.
pub struct AuthClient {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl AuthClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_token_url(client_id, client_secret, ACCOUNTS_TOKEN_URL)
    }

    /// Point at a different token endpoint (tests).
    pub fn with_token_url(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant> {
        debug!(url = %self.token_url, "Exchanging authorization code");
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        self.token_request(&params).await
    }

    /// Redeem a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        debug!(url = %self.token_url, "Refreshing access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        match self.token_request(&params).await {
            Ok(grant) => {
                debug!("Token refresh successful");
                Ok(grant)
            }
            Err(SpotifyError::Upstream { status, message }) => {
                warn!(status, "Token refresh rejected");
                Err(SpotifyError::RefreshFailed(message))
            }
            Err(e) => Err(e),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            response.json::<TokenGrant>().await.map_err(|e| {
                SpotifyError::Parse(format!("Failed to parse token response: {e}"))
            })
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(SpotifyError::Upstream {
                status: status.as_u16(),
                message,
            })
        }
    }
}

struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at_ms: u64,
}

/// Holds the session's tokens and refreshes them just before expiry.
pub struct TokenManager {
    auth: AuthClient,
    state: Mutex<TokenState>,
}

impl TokenManager {
    /// Create a manager from previously issued tokens.
    ///
    /// `expires_at_ms` is epoch milliseconds, matching how the browser side
    /// stores it.
    pub fn new(
        auth: AuthClient,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at_ms: u64,
    ) -> Self {
        Self {
            auth,
            state: Mutex::new(TokenState {
                access_token: Some(access_token.into()),
                refresh_token: Some(refresh_token.into()),
                expires_at_ms,
            }),
        }
    }

    async fn refresh_locked(&self, state: &mut TokenState) -> Result<String> {
        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or(SpotifyError::NoToken)?;

        let grant = self.auth.refresh(&refresh_token).await?;
        state.expires_at_ms = now_ms() + grant.expires_in * 1000;
        state.access_token = Some(grant.access_token.clone());
        // A refresh response may omit the refresh token; keep the old one.
        if let Some(new_refresh) = grant.refresh_token {
            state.refresh_token = Some(new_refresh);
        }
        Ok(grant.access_token)
    }
}

#[async_trait]
impl TokenProvider for TokenManager {
    async fn get_valid_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let Some(token) = &state.access_token {
            if now_ms() + EXPIRY_BUFFER.as_millis() as u64 <= state.expires_at_ms {
                return Ok(token.clone());
            }
        }

        debug!("Access token expired or expiring soon, refreshing");
        self.refresh_locked(&mut state).await
    }

    async fn refresh_now(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
